use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use transport::{Frame, InboundMessage, OutgoingMessage};

async fn next_message(reader: &mut transport::WebSocketReader) -> InboundMessage {
    match reader.next().await.unwrap().unwrap() {
        Frame::Complete(unit) => InboundMessage::from_slice(&unit).unwrap(),
        Frame::Malformed { reason, .. } => panic!("malformed frame: {reason}"),
    }
}

#[tokio::test]
async fn websocket_call_reply_after_truncated_message() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let browser = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        // each envelope arrives as exactly one text message
        let Some(Ok(Message::Text(text))) = ws.next().await else {
            panic!("expected a text message");
        };
        let call: OutgoingMessage = serde_json::from_str(text.as_str()).unwrap();
        assert_eq!(call.method, "Page.navigate");
        assert_eq!(call.params["url"], "http://example.com");

        // a message cut short, then a reply and an event sharing one message
        ws.send(Message::Text(r#"{"id":"#.to_string().into()))
            .await
            .unwrap();
        let reply = format!(r#"{{"id":{},"result":{{"frameId":"F1"}}}}"#, call.id);
        ws.send(Message::Text(
            format!(r#"{reply}{{"method":"Page.loadEventFired","params":{{"timestamp":1.5}}}}"#)
                .into(),
        ))
        .await
        .unwrap();

        ws.close(None).await.unwrap();
    });

    let (mut reader, mut writer) = transport::connect(&format!("ws://{addr}/devtools/page/T1"))
        .await
        .unwrap();

    writer
        .send(OutgoingMessage::new(
            3,
            "Page.navigate",
            Some(serde_json::json!({"url": "http://example.com"})),
        ))
        .await
        .unwrap();

    let frame = reader.next().await.unwrap().unwrap();
    assert!(matches!(frame, Frame::Malformed { ref bytes, .. } if &bytes[..] == br#"{"id":"#));

    let InboundMessage::Reply(reply) = next_message(&mut reader).await else {
        panic!("expected a reply");
    };
    assert_eq!(reply.id, 3);
    assert_eq!(reply.result["frameId"], "F1");

    let InboundMessage::Event(event) = next_message(&mut reader).await else {
        panic!("expected an event");
    };
    assert_eq!(event.method, "Page.loadEventFired");

    assert!(reader.next().await.is_none());
    browser.await.unwrap();
}
