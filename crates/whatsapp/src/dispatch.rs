//! Per-event processing: unwrap, classify, act.

use std::sync::Arc;

use {
    stickerbot_channels::Session,
    stickerbot_config::{DiagnosticsConfig, StickerBotConfig},
    stickerbot_media::StickerEncoder,
    stickerbot_protocol::{InboundEvent, MediaDescriptor},
    tracing::{debug, error, info, warn},
};

#[cfg(feature = "metrics")]
use stickerbot_metrics::{counter, histogram, labels, messages, replies, stickers};

use crate::{
    Result,
    classify::{ClassifyRules, DispatchAction, IgnoreReason, StickerStrategy, classify},
    diagnostics::envelope_dump,
    fetch::fetch_media,
    unwrap::{UnwrappedMessage, unwrap},
};

/// The two sticker strategies.
#[derive(Clone)]
pub struct Encoders {
    pub still: Arc<dyn StickerEncoder>,
    pub animated: Arc<dyn StickerEncoder>,
}

impl Encoders {
    fn for_strategy(&self, strategy: StickerStrategy) -> &Arc<dyn StickerEncoder> {
        match strategy {
            StickerStrategy::Static => &self.still,
            StickerStrategy::Animated => &self.animated,
        }
    }
}

/// Answers inbound messages through one session.
pub struct Dispatcher {
    session: Arc<dyn Session>,
    encoders: Encoders,
    rules: ClassifyRules,
    diagnostics: DiagnosticsConfig,
}

impl Dispatcher {
    #[must_use]
    pub fn new(session: Arc<dyn Session>, encoders: Encoders, config: &StickerBotConfig) -> Self {
        Self {
            session,
            encoders,
            rules: ClassifyRules::from_config(config),
            diagnostics: config.diagnostics.clone(),
        }
    }

    /// Process events in order. A failing event is logged and skipped; it
    /// never stops the rest of the batch.
    pub async fn handle_batch(&self, events: Vec<InboundEvent>) {
        for event in &events {
            if let Err(e) = self.handle_event(event).await {
                error!(
                    jid = %event.remote_jid(),
                    message_id = %event.message_id(),
                    error = %e,
                    "failed to process message"
                );
                #[cfg(feature = "metrics")]
                counter!(messages::DISPATCH_ERRORS_TOTAL).increment(1);
            }
        }
    }

    pub async fn handle_event(&self, event: &InboundEvent) -> Result<()> {
        let Some(envelope) = event.message.as_ref() else {
            debug!(message_id = %event.message_id(), "no content to dispatch");
            return Ok(());
        };
        let unwrapped = unwrap(envelope);
        let action = classify(event, &unwrapped, &self.rules);
        self.dispatch(event, &unwrapped, action).await
    }

    /// Perform `action`. Sends at most one message.
    pub async fn dispatch(
        &self,
        event: &InboundEvent,
        unwrapped: &UnwrappedMessage<'_>,
        action: DispatchAction,
    ) -> Result<()> {
        let jid = event.remote_jid();
        let message_id = event.message_id();

        if let DispatchAction::Ignore(reason @ (IgnoreReason::OwnMessage | IgnoreReason::Broadcast)) =
            action
        {
            debug!(jid, message_id, %reason, "skipping message");
            #[cfg(feature = "metrics")]
            counter!(messages::IGNORED_TOTAL, labels::REASON => reason.as_str()).increment(1);
            return Ok(());
        }

        info!(
            jid,
            message_id,
            content_type = %display_type(unwrapped.content_type.as_ref()),
            inner_type = %display_type(unwrapped.inner_content_type.as_ref()),
            "message received"
        );
        if unwrapped.is_view_once {
            info!(jid, message_id, "view-once message");
        }

        match action {
            DispatchAction::Ignore(reason) => {
                match reason {
                    IgnoreReason::MissingMarker => {
                        info!(jid, caption = unwrapped.caption, "caption without sticker marker");
                    },
                    _ => debug!(jid, message_id, %reason, "message is not sticker-eligible"),
                }
                #[cfg(feature = "metrics")]
                counter!(messages::IGNORED_TOTAL, labels::REASON => reason.as_str()).increment(1);
                Ok(())
            },
            DispatchAction::ConfirmationNoticed { reply } => {
                info!(jid, text = unwrapped.text, "confirmation message detected");
                let sent = match reply {
                    Some(reply) => self.reply(event, &reply, "confirmation").await,
                    None => Ok(()),
                };
                if self.rules.wants_diagnostic(unwrapped) {
                    self.diagnose(event, unwrapped);
                }
                sent
            },
            DispatchAction::Acknowledge { reply } => {
                info!(jid, text = unwrapped.text, "door keyword detected");
                let sent = self.reply(event, &reply, "ack").await;
                if self.rules.wants_diagnostic(unwrapped) {
                    self.diagnose(event, unwrapped);
                }
                sent
            },
            DispatchAction::Diagnose => {
                self.diagnose(event, unwrapped);
                Ok(())
            },
            DispatchAction::Sticker { media, strategy } => {
                self.send_sticker(event, &media, strategy).await
            },
        }
    }

    fn diagnose(&self, event: &InboundEvent, unwrapped: &UnwrappedMessage<'_>) {
        warn!(
            jid = %event.remote_jid(),
            message_id = %event.message_id(),
            dump = %envelope_dump(unwrapped, &self.diagnostics),
            "sticker marker without image or video"
        );
    }

    async fn reply(&self, event: &InboundEvent, text: &str, kind: &'static str) -> Result<()> {
        self.session
            .send_text(event.remote_jid(), text, event)
            .await?;
        debug!(jid = %event.remote_jid(), kind, "reply sent");
        #[cfg(feature = "metrics")]
        counter!(replies::SENT_TOTAL, labels::REPLY => kind).increment(1);
        Ok(())
    }

    async fn send_sticker(
        &self,
        event: &InboundEvent,
        media: &MediaDescriptor,
        strategy: StickerStrategy,
    ) -> Result<()> {
        let jid = event.remote_jid();
        let encoder = self.encoders.for_strategy(strategy);
        if !encoder.is_available() {
            warn!(jid, %strategy, "sticker encoder backend unavailable, skipping");
            #[cfg(feature = "metrics")]
            counter!(stickers::BACKEND_UNAVAILABLE_TOTAL, labels::KIND => strategy.as_str())
                .increment(1);
            return Ok(());
        }

        info!(jid, kind = %media.kind, %strategy, "downloading media");
        let data = fetch_media(self.session.as_ref(), media).await?;
        info!(jid, bytes = data.len(), "download complete");
        #[cfg(feature = "metrics")]
        histogram!(stickers::MEDIA_BYTES).record(data.len() as f64);

        #[cfg(feature = "metrics")]
        let started = std::time::Instant::now();
        debug!(jid, %strategy, "converting to sticker");
        let sticker = encoder.encode(&data, media.kind).await?;
        #[cfg(feature = "metrics")]
        histogram!(stickers::ENCODE_DURATION_SECONDS, labels::KIND => strategy.as_str())
            .record(started.elapsed().as_secs_f64());

        self.session.send_sticker(jid, sticker, event).await?;
        info!(jid, %strategy, "sticker sent");
        #[cfg(feature = "metrics")]
        counter!(stickers::SENT_TOTAL, labels::KIND => strategy.as_str()).increment(1);
        Ok(())
    }
}

fn display_type(content_type: Option<&stickerbot_protocol::ContentType>) -> String {
    content_type.map_or_else(|| "none".to_string(), ToString::to_string)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::{io::Cursor, sync::Mutex};

    use {
        serde_json::json,
        stickerbot_media::{
            AnimatedStickerEncoder, StaticStickerEncoder, TranscodeOptions, VideoTranscoder,
        },
        stickerbot_protocol::{MediaKind, Message, MessageKey},
    };

    use {
        super::*,
        crate::test_support::{MockEncoder, MockSession, Sent},
    };

    const CHAT: &str = "120363025246125486@g.us";

    fn event(id: &str, message: serde_json::Value) -> InboundEvent {
        InboundEvent {
            key: MessageKey {
                remote_jid: Some(CHAT.into()),
                id: Some(id.into()),
                from_me: false,
                participant: Some("5511977776666@s.whatsapp.net".into()),
            },
            message: Some(serde_json::from_value::<Message>(message).unwrap()),
            ..Default::default()
        }
    }

    fn mock_encoders() -> (Arc<MockEncoder>, Arc<MockEncoder>, Encoders) {
        let still = Arc::new(MockEncoder::default());
        let animated = Arc::new(MockEncoder::default());
        let encoders = Encoders {
            still: Arc::clone(&still) as Arc<dyn StickerEncoder>,
            animated: Arc::clone(&animated) as Arc<dyn StickerEncoder>,
        };
        (still, animated, encoders)
    }

    fn dispatcher(session: &Arc<MockSession>, encoders: Encoders) -> Dispatcher {
        Dispatcher::new(
            Arc::clone(session) as Arc<dyn Session>,
            encoders,
            &StickerBotConfig::default(),
        )
    }

    fn jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 30, 30]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Jpeg).unwrap();
        out.into_inner()
    }

    #[tokio::test]
    async fn own_and_broadcast_messages_send_nothing() {
        let session = Arc::new(MockSession::default());
        let (still, animated, encoders) = mock_encoders();
        let d = dispatcher(&session, encoders);

        let mut own = event("1", json!({ "conversation": "porta" }));
        own.key.from_me = true;
        let mut status = event("2", json!({ "imageMessage": { "caption": "#s" } }));
        status.key.remote_jid = Some("status@broadcast".into());

        d.handle_batch(vec![own, status]).await;
        assert!(session.sent().is_empty());
        assert_eq!(still.calls(), 0);
        assert_eq!(animated.calls(), 0);
    }

    #[tokio::test]
    async fn door_keyword_gets_one_quoted_reply() {
        let session = Arc::new(MockSession::default());
        let (_, _, encoders) = mock_encoders();
        let d = dispatcher(&session, encoders);

        d.handle_batch(vec![event("K1", json!({ "conversation": "Alguem abre a PORTA?" }))])
            .await;

        assert_eq!(session.sent(), vec![Sent::Text {
            jid: CHAT.into(),
            text: "pego".into(),
            quoted_id: "K1".into(),
        }]);
    }

    #[tokio::test]
    async fn confirmation_sends_nothing() {
        let session = Arc::new(MockSession::default());
        let (_, _, encoders) = mock_encoders();
        let d = dispatcher(&session, encoders);

        d.handle_batch(vec![event(
            "K2",
            json!({ "conversation": "para confirmar, a porta fechou" }),
        )])
        .await;
        assert!(session.sent().is_empty());
    }

    #[tokio::test]
    async fn jpeg_with_marker_becomes_512_sticker() {
        let session = Arc::new(MockSession::with_media(jpeg(300, 120)));
        let (_, animated, _) = mock_encoders();
        let d = dispatcher(&session, Encoders {
            still: Arc::new(StaticStickerEncoder::default()),
            animated: animated.clone(),
        });

        d.handle_batch(vec![event(
            "S1",
            json!({ "imageMessage": { "mimetype": "image/jpeg", "caption": "sticker #s" } }),
        )])
        .await;

        let sent = session.sent();
        assert_eq!(sent.len(), 1);
        let Sent::Sticker { bytes, quoted_id, .. } = &sent[0] else {
            panic!("expected sticker, got {sent:?}");
        };
        assert_eq!(quoted_id, "S1");
        let decoded = image::load_from_memory_with_format(bytes, image::ImageFormat::WebP).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (512, 512));
        assert_eq!(session.fetched(), vec![MediaKind::Image]);
        assert_eq!(animated.calls(), 0);
    }

    #[tokio::test]
    async fn gif_playback_video_uses_animated_path() {
        let session = Arc::new(MockSession::with_media(b"fake mp4".to_vec()));
        let (still, animated, encoders) = mock_encoders();
        let d = dispatcher(&session, encoders);

        d.handle_batch(vec![event(
            "V1",
            json!({ "videoMessage": { "mimetype": "video/mp4", "gifPlayback": true, "caption": "#s" } }),
        )])
        .await;

        assert_eq!(animated.seen(), vec![(b"fake mp4".to_vec(), MediaKind::Video)]);
        assert_eq!(still.calls(), 0);
        assert!(matches!(session.sent().as_slice(), [Sent::Sticker { .. }]));
    }

    /// Fails every transcode after checking its files exist.
    #[derive(Default)]
    struct FailingTranscoder {
        paths: Mutex<Vec<std::path::PathBuf>>,
    }

    #[async_trait::async_trait]
    impl VideoTranscoder for FailingTranscoder {
        fn is_available(&self) -> bool {
            true
        }

        async fn transcode(
            &self,
            input: &std::path::Path,
            output: &std::path::Path,
            _options: &TranscodeOptions,
        ) -> stickerbot_media::Result<()> {
            assert!(input.exists() && output.exists());
            self.paths
                .lock()
                .unwrap()
                .extend([input.to_path_buf(), output.to_path_buf()]);
            Err(stickerbot_media::Error::transcode("mock ffmpeg failure"))
        }
    }

    #[tokio::test]
    async fn failed_transcode_leaves_no_temp_files_and_sends_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let session = Arc::new(MockSession::with_media(b"fake mp4".to_vec()));
        let (still, _, _) = mock_encoders();
        let animated = Arc::new(
            AnimatedStickerEncoder::new(FailingTranscoder::default(), TranscodeOptions::default())
                .with_temp_dir(dir.path()),
        );
        let d = dispatcher(&session, Encoders { still, animated });

        let err = d
            .handle_event(&event(
                "V2",
                json!({ "videoMessage": { "gifPlayback": true, "caption": "#s" } }),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::Media(_)));
        assert!(session.sent().is_empty());
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn missing_marker_never_touches_encoders() {
        let session = Arc::new(MockSession::with_media(b"bytes".to_vec()));
        let (still, animated, encoders) = mock_encoders();
        let d = dispatcher(&session, encoders);

        d.handle_batch(vec![
            event("M1", json!({ "imageMessage": { "mimetype": "image/png", "caption": "oi" } })),
            event("M2", json!({ "videoMessage": { "gifPlayback": true } })),
            event("M3", json!({ "imageMessage": { "mimetype": "image/gif", "caption": "#S" } })),
        ])
        .await;

        assert!(session.sent().is_empty());
        assert!(session.fetched().is_empty());
        assert_eq!(still.calls() + animated.calls(), 0);
    }

    #[tokio::test]
    async fn unavailable_backend_is_skipped_before_download() {
        let session = Arc::new(MockSession::with_media(b"gif".to_vec()));
        let (_, animated, encoders) = mock_encoders();
        animated.set_available(false);
        let d = dispatcher(&session, encoders);

        d.handle_event(&event(
            "G1",
            json!({ "imageMessage": { "mimetype": "image/gif", "caption": "#s" } }),
        ))
        .await
        .unwrap();

        assert!(session.fetched().is_empty());
        assert_eq!(animated.calls(), 0);
        assert!(session.sent().is_empty());
    }

    #[tokio::test]
    async fn marker_without_media_only_logs() {
        let session = Arc::new(MockSession::default());
        let (still, animated, encoders) = mock_encoders();
        let d = dispatcher(&session, encoders);

        d.handle_event(&event("D1", json!({ "extendedTextMessage": { "text": "cade o #s" } })))
            .await
            .unwrap();
        assert!(session.sent().is_empty());
        assert_eq!(still.calls() + animated.calls(), 0);
    }

    #[tokio::test]
    async fn keyword_with_marker_still_replies_once() {
        let session = Arc::new(MockSession::default());
        let (still, animated, encoders) = mock_encoders();
        let d = dispatcher(&session, encoders);

        d.handle_event(&event("D2", json!({ "extendedTextMessage": { "text": "porta #s" } })))
            .await
            .unwrap();
        assert_eq!(session.sent(), vec![Sent::Text {
            jid: CHAT.into(),
            text: "pego".into(),
            quoted_id: "D2".into(),
        }]);
        assert_eq!(still.calls() + animated.calls(), 0);
    }

    #[tokio::test]
    async fn failing_event_does_not_stop_the_batch() {
        let session = Arc::new(MockSession::default());
        session.fail_next_send();
        let (_, _, encoders) = mock_encoders();
        let d = dispatcher(&session, encoders);

        d.handle_batch(vec![
            event("F1", json!({ "conversation": "porta" })),
            event("F2", json!({ "conversation": "porta" })),
        ])
        .await;

        let sent = session.sent();
        assert_eq!(sent.len(), 1);
        assert!(matches!(&sent[0], Sent::Text { quoted_id, .. } if quoted_id == "F2"));
    }
}
