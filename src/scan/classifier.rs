/// Media classification.
use crate::platform::Message;

/// How many media units a message contributes: one per file attachment,
/// plus one per embed carrying an image, video, or thumbnail preview.
/// Messages with a zero count never create a statistic entry.
pub fn media_count(message: &Message) -> u64 {
    let embed_media = message.embeds.iter().filter(|e| e.is_media()).count();
    (message.attachment_count + embed_media) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{EmbedPreview, MessageId, UserId};
    use chrono::Utc;

    fn message(attachments: usize, embeds: Vec<EmbedPreview>) -> Message {
        Message {
            id: MessageId(1),
            author_id: UserId(1),
            author_is_bot: false,
            timestamp: Utc::now(),
            attachment_count: attachments,
            embeds,
        }
    }

    #[test]
    fn counts_attachments_and_media_embeds() {
        let msg = message(
            1,
            vec![EmbedPreview {
                image: true,
                ..Default::default()
            }],
        );
        assert_eq!(media_count(&msg), 2);
    }

    #[test]
    fn link_only_embeds_count_zero() {
        let msg = message(0, vec![EmbedPreview::default(), EmbedPreview::default()]);
        assert_eq!(media_count(&msg), 0);
    }

    #[test]
    fn video_and_thumbnail_each_qualify() {
        let msg = message(
            0,
            vec![
                EmbedPreview {
                    video: true,
                    ..Default::default()
                },
                EmbedPreview {
                    thumbnail: true,
                    ..Default::default()
                },
            ],
        );
        assert_eq!(media_count(&msg), 2);
    }
}
