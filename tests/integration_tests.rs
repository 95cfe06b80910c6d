//! Integration tests for the chat orchestrator.
//! A scripted adapter stands in for the model backend, so these run offline.

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use chatwindow::chat::{ChatOrchestrator, EventOutcome, Renderer, Session, TurnState, UiEvent};
    use chatwindow::{
        Attachment, ChatMessage, ConfigStore, ContentBlock, ContextMessage, Error, GREETING,
        InferenceParameters, InvokeRequest, MessageRole, ModelAdapter, ModelResponse,
        ParameterChange, Result, ThumbnailGrid, TokenSink,
    };
    use image::{DynamicImage, ImageFormat, RgbImage};

    const TABLE: &str = r#"
models:
  vision:
    model_id: backend-vision
    default_system_prompt: "You're a helpful assistant."
  plain:
    model_id: backend-plain
    system_prompt_disabled: true
    image_upload_disabled: true
"#;

    enum Reply {
        Text(Vec<&'static str>),
        Fail(Vec<&'static str>),
        NewChatMidStream(&'static str, &'static str),
        Stall(&'static str, &'static str),
    }

    struct Recorded {
        context: Vec<ContextMessage>,
        parameters: InferenceParameters,
    }

    struct Scripted {
        replies: Mutex<VecDeque<Reply>>,
        requests: Mutex<Vec<Recorded>>,
        new_chat: Arc<AtomicBool>,
    }

    impl Scripted {
        fn new(replies: Vec<Reply>, new_chat: Arc<AtomicBool>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
                new_chat,
            }
        }
    }

    #[async_trait::async_trait]
    impl ModelAdapter for Scripted {
        async fn invoke(
            &self,
            request: InvokeRequest<'_>,
            sink: &mut dyn TokenSink,
        ) -> Result<ModelResponse> {
            self.requests.lock().unwrap().push(Recorded {
                context: request.context.to_vec(),
                parameters: request.parameters.clone(),
            });
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Reply::Text(vec!["ok"]));
            match reply {
                Reply::Text(tokens) => {
                    for token in &tokens {
                        sink.on_token(token);
                    }
                    Ok(ModelResponse::text(tokens.concat()))
                }
                Reply::Fail(tokens) => {
                    for token in &tokens {
                        sink.on_token(token);
                    }
                    Err(Error::streaming("connection dropped", None))
                }
                Reply::NewChatMidStream(before, after) => {
                    sink.on_token(before);
                    self.new_chat.store(true, Ordering::SeqCst);
                    sink.on_token(after);
                    Ok(ModelResponse::text(format!("{before}{after}")))
                }
                Reply::Stall(before, after) => {
                    sink.on_token(before);
                    tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
                    sink.on_token(after);
                    Ok(ModelResponse::text(format!("{before}{after}")))
                }
            }
        }
    }

    #[derive(Default)]
    struct Recorder {
        streamed: String,
        errors: Vec<String>,
        shown: Vec<(ChatMessage, usize)>,
        pending: Vec<usize>,
        discarded: usize,
    }

    impl Renderer for Recorder {
        fn print_text(&mut self, text: &str) {
            self.streamed.push_str(text);
        }
        fn print_error(&mut self, error: &str) {
            self.errors.push(error.to_string());
        }
        fn print_info(&mut self, _: &str) {}
        fn show_message(&mut self, message: &ChatMessage, thumbnails: &ThumbnailGrid) {
            self.shown.push((message.clone(), thumbnails.len()));
        }
        fn show_pending(&mut self, pending: &ThumbnailGrid) {
            self.pending.push(pending.len());
        }
        fn start_response(&mut self) {}
        fn finish_response(&mut self) {}
        fn print_discarded(&mut self) {
            self.discarded += 1;
        }
    }

    struct Harness {
        orchestrator: ChatOrchestrator<Scripted>,
        new_chat: Arc<AtomicBool>,
        renderer: Recorder,
    }

    impl Harness {
        fn new(replies: Vec<Reply>) -> Self {
            let new_chat = Arc::new(AtomicBool::new(false));
            let store = ConfigStore::from_yaml_str(TABLE).unwrap();
            Self {
                orchestrator: ChatOrchestrator::new(
                    store,
                    Scripted::new(replies, Arc::clone(&new_chat)),
                ),
                new_chat,
                renderer: Recorder::default(),
            }
        }

        fn session(&self, model: &str) -> Session {
            self.orchestrator.initialize_session(Some(model)).unwrap()
        }

        async fn send(&mut self, session: Session, event: UiEvent) -> (Session, Result<EventOutcome>) {
            let handled = self
                .orchestrator
                .handle(session, event, &mut self.renderer, &self.new_chat)
                .await;
            (handled.session, handled.outcome)
        }

        fn requests(&self) -> std::sync::MutexGuard<'_, Vec<Recorded>> {
            self.orchestrator.adapter().requests.lock().unwrap()
        }
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let image = DynamicImage::ImageRgb8(RgbImage::new(width, height));
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, ImageFormat::Png).unwrap();
        buffer.into_inner()
    }

    #[tokio::test]
    async fn fresh_and_reset_sessions_show_greeting() {
        let mut harness = Harness::new(vec![]);
        let session = harness.session("vision");
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].role, MessageRole::Assistant);
        assert_eq!(session.messages()[0].content.display_text(), GREETING);

        let (session, _) = harness
            .send(session, UiEvent::Submit("Hello".to_string()))
            .await;
        let epoch = session.upload_epoch();
        let (session, outcome) = harness.send(session, UiEvent::NewChat).await;
        assert!(matches!(outcome, Ok(EventOutcome::Reset)));
        assert_eq!(session.messages(), &[ChatMessage::greeting()]);
        assert!(session.memory().is_empty());
        assert_ne!(session.upload_epoch(), epoch);
    }

    #[tokio::test]
    async fn hello_grows_log_from_one_to_three() {
        let mut harness = Harness::new(vec![Reply::Text(vec!["Hi", " there"])]);
        let session = harness.session("vision");
        let (session, outcome) = harness
            .send(session, UiEvent::Submit("Hello".to_string()))
            .await;

        assert!(matches!(outcome, Ok(EventOutcome::Responded(_))));
        assert_eq!(harness.renderer.streamed, "Hi there");
        let messages = session.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].role, MessageRole::User);
        assert_eq!(messages[1].content.display_text(), "Hello");
        assert!(messages[1].images.is_empty());
        assert_eq!(messages[2].role, MessageRole::Assistant);
        assert_eq!(messages[2].content.display_text(), "Hi there");
        assert_eq!(session.memory().len(), 2);
        assert_eq!(session.turn(), TurnState::Idle);

        let requests = harness.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].context.len(), 1);
        assert_eq!(
            requests[0].parameters.system_prompt.as_deref(),
            Some("You're a helpful assistant.")
        );
    }

    #[tokio::test]
    async fn new_chat_while_streaming_discards_response() {
        let mut harness = Harness::new(vec![Reply::NewChatMidStream("before", "after")]);
        let session = harness.session("vision");
        let generation = session.generation();
        let (session, outcome) = harness
            .send(session, UiEvent::Submit("Hello".to_string()))
            .await;

        assert!(matches!(outcome, Ok(EventOutcome::Discarded)));
        assert_eq!(harness.renderer.streamed, "before");
        assert_eq!(harness.renderer.discarded, 1);
        assert_eq!(session.messages(), &[ChatMessage::greeting()]);
        assert!(session.memory().is_empty());
        assert_eq!(session.generation(), generation + 1);
        assert_eq!(session.turn(), TurnState::Idle);
        assert!(!harness.new_chat.load(Ordering::SeqCst));
        assert_eq!(session.stats().discarded_turns, 1);
    }

    #[tokio::test]
    async fn new_chat_drops_a_pending_backend_call() {
        let mut harness = Harness::new(vec![Reply::Stall("partial", "late")]);
        let session = harness.session("vision");
        let generation = session.generation();
        let flag = Arc::clone(&harness.new_chat);
        let trigger = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            flag.store(true, Ordering::SeqCst);
        });

        let (session, outcome) = harness
            .send(session, UiEvent::Submit("Hello".to_string()))
            .await;
        trigger.await.unwrap();

        assert!(matches!(outcome, Ok(EventOutcome::Discarded)));
        assert_eq!(harness.renderer.streamed, "partial");
        assert_eq!(harness.renderer.discarded, 1);
        assert_eq!(session.messages(), &[ChatMessage::greeting()]);
        assert!(session.memory().is_empty());
        assert_eq!(session.generation(), generation + 1);
        assert_eq!(session.turn(), TurnState::Idle);
        assert!(!harness.new_chat.load(Ordering::SeqCst));
        assert_eq!(harness.requests().len(), 1);
    }

    #[tokio::test]
    async fn zero_memory_window_sends_only_the_new_turn() {
        let mut harness = Harness::new(vec![]);
        let session = harness.session("vision");
        let (session, _) = harness
            .send(session, UiEvent::Submit("first".to_string()))
            .await;
        let (session, _) = harness
            .send(session, UiEvent::Adjust(ParameterChange::MemoryWindow(0)))
            .await;
        let (session, _) = harness
            .send(session, UiEvent::Submit("second".to_string()))
            .await;

        let requests = harness.requests();
        assert_eq!(requests[1].context.len(), 1);
        assert_eq!(requests[1].context[0].content.display_text(), "second");
        assert_eq!(session.memory().len(), 4);
    }

    #[tokio::test]
    async fn memory_window_carries_prior_exchanges() {
        let mut harness = Harness::new(vec![Reply::Text(vec!["a1"]), Reply::Text(vec!["a2"])]);
        let session = harness.session("vision");
        let (session, _) = harness
            .send(session, UiEvent::Submit("q1".to_string()))
            .await;
        let (_session, _) = harness
            .send(session, UiEvent::Submit("q2".to_string()))
            .await;

        let requests = harness.requests();
        let texts: Vec<_> = requests[1]
            .context
            .iter()
            .map(|message| (message.role, message.content.display_text()))
            .collect();
        assert_eq!(
            texts,
            vec![
                (MessageRole::User, "q1".to_string()),
                (MessageRole::Assistant, "a1".to_string()),
                (MessageRole::User, "q2".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn twelve_uploads_ride_along_once() {
        let mut harness = Harness::new(vec![]);
        let session = harness.session("vision");
        let uploads: Vec<_> = (0..12)
            .map(|i| Attachment::new(format!("{i}.png"), png(20 + i, 10)))
            .collect();
        let ids: Vec<_> = uploads.iter().map(Attachment::id).collect();

        let (session, outcome) = harness.send(session, UiEvent::Upload(uploads)).await;
        let Ok(EventOutcome::UploadsChanged { pending, skipped }) = outcome else {
            panic!("expected an upload preview");
        };
        assert!(skipped.is_empty());
        let row_lengths: Vec<_> = pending.rows().iter().map(Vec::len).collect();
        assert_eq!(row_lengths, vec![10, 2]);

        let (session, _) = harness
            .send(session, UiEvent::Submit("look".to_string()))
            .await;
        assert_eq!(session.messages()[1].images, ids);
        assert_eq!(session.messages()[1].content.image_count(), 12);
        assert_eq!(harness.renderer.shown.last().map(|(_, n)| *n), Some(12));

        let (session, _) = harness
            .send(session, UiEvent::Submit("again".to_string()))
            .await;
        assert!(session.messages()[3].images.is_empty());
        assert_eq!(session.stats().pending_uploads, 0);

        let requests = harness.requests();
        let blocks = requests[0].context[0].content.to_blocks();
        assert_eq!(blocks.len(), 13);
        assert!(matches!(blocks[0], ContentBlock::Text { .. }));
        assert!(blocks[1..].iter().all(|block| block.as_image().is_some()));
    }

    #[tokio::test]
    async fn undecodable_upload_is_skipped() {
        let mut harness = Harness::new(vec![]);
        let session = harness.session("vision");
        let good = Attachment::new("good.png", png(8, 8));
        let bad = Attachment::new("notes.txt", b"not an image".to_vec());
        let (session, outcome) = harness
            .send(session, UiEvent::Upload(vec![bad, good.clone()]))
            .await;
        let Ok(EventOutcome::UploadsChanged { pending, skipped }) = outcome else {
            panic!("expected an upload preview");
        };
        assert_eq!(pending.len(), 1);
        assert_eq!(skipped.len(), 1);
        assert!(skipped[0].error.is_attachment_decode());

        let (session, outcome) = harness
            .send(session, UiEvent::Submit("what is this".to_string()))
            .await;
        assert!(outcome.is_ok());
        assert_eq!(session.messages()[1].images, vec![good.id()]);
        assert_eq!(harness.renderer.errors.len(), 1);
    }

    #[tokio::test]
    async fn disabled_system_prompt_is_omitted() {
        let mut harness = Harness::new(vec![]);
        let session = harness.session("plain");
        let (session, _) = harness
            .send(
                session,
                UiEvent::Adjust(ParameterChange::SystemPrompt("ignored".to_string())),
            )
            .await;
        let (_session, _) = harness
            .send(session, UiEvent::Submit("Hello".to_string()))
            .await;

        let requests = harness.requests();
        assert_eq!(requests[0].parameters.system_prompt, None);
        let json = serde_json::to_value(&requests[0].parameters).unwrap();
        assert!(json.get("system").is_none());
        assert!(json.get("temperature").is_some());
    }

    #[tokio::test]
    async fn invocation_error_keeps_partial_text() {
        let mut harness = Harness::new(vec![Reply::Fail(vec!["par", "tial"])]);
        let session = harness.session("vision");
        let (session, outcome) = harness
            .send(session, UiEvent::Submit("Hello".to_string()))
            .await;

        let err = outcome.unwrap_err();
        assert!(err.is_model_invocation());
        assert_eq!(session.messages().len(), 3);
        assert_eq!(session.messages()[2].content.display_text(), "partial");
        assert!(session.memory().is_empty());
        assert_eq!(session.turn(), TurnState::Idle);
        assert_eq!(session.stats().failed_turns, 1);
    }

    #[tokio::test]
    async fn unknown_model_leaves_session_unchanged() {
        let mut harness = Harness::new(vec![]);
        let session = harness.session("vision");
        let widgets = session.widgets().clone();
        let (session, outcome) = harness
            .send(session, UiEvent::SelectModel("nope".to_string()))
            .await;

        let err = outcome.unwrap_err();
        assert!(err.is_config());
        assert_eq!(err.model(), Some("nope"));
        assert_eq!(session.model_name(), "vision");
        assert_eq!(session.widgets(), &widgets);
        assert_eq!(session.messages().len(), 1);
    }

    #[tokio::test]
    async fn attachment_only_submission_is_staged() {
        let mut harness = Harness::new(vec![]);
        let session = harness.session("vision");
        let upload = Attachment::new("cat.png", png(16, 16));
        let (session, _) = harness.send(session, UiEvent::Upload(vec![upload.clone()])).await;

        let (session, outcome) = harness.send(session, UiEvent::Submit("   ".to_string())).await;
        let Ok(EventOutcome::Staged { pending }) = outcome else {
            panic!("expected staged uploads");
        };
        assert_eq!(pending.len(), 1);
        assert_eq!(harness.renderer.pending, vec![1]);
        assert_eq!(session.messages().len(), 1);
        assert!(harness.requests().is_empty());

        let (session, _) = harness
            .send(session, UiEvent::Submit("describe it".to_string()))
            .await;
        assert_eq!(session.messages()[1].images, vec![upload.id()]);
    }

    #[tokio::test]
    async fn empty_submission_does_nothing() {
        let mut harness = Harness::new(vec![]);
        let session = harness.session("vision");
        let (session, outcome) = harness.send(session, UiEvent::Submit(String::new())).await;
        assert!(matches!(outcome, Ok(EventOutcome::Ignored)));
        assert_eq!(session.messages().len(), 1);
        assert!(harness.requests().is_empty());
    }

    #[tokio::test]
    async fn switching_models_reseeds_widgets() {
        let mut harness = Harness::new(vec![]);
        let session = harness.session("vision");
        let (session, _) = harness
            .send(session, UiEvent::Adjust(ParameterChange::TopK(3)))
            .await;
        let (session, outcome) = harness
            .send(session, UiEvent::SelectModel("plain".to_string()))
            .await;
        assert!(matches!(outcome, Ok(EventOutcome::ModelSelected(name)) if name == "plain"));
        assert_eq!(session.widgets().top_k, 500);
        assert_eq!(session.widgets().system_prompt, "");
    }
}
