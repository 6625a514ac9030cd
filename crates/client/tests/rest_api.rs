use mfgdesk_client::{ApiClient, Credential, NotificationApi};
use mfgdesk_shared::{ApiError, NotificationQuery};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Serve exactly one HTTP response and hand back the request head.
async fn one_shot(status: &str, body: &str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let response = format!(
        "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
    );

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut head = Vec::new();
        let mut buf = [0u8; 1024];
        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut buf).await.unwrap();
            assert!(n > 0, "client hung up mid-request");
            head.extend_from_slice(&buf[..n]);
        }
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.shutdown().await.unwrap();
        String::from_utf8(head).unwrap()
    });
    (base, server)
}

#[tokio::test]
async fn fetch_sends_bearer_and_query() {
    let body = r#"{"notifications":[{"id":42,"type":"new_email","title":"Invoice from supplier","message":"","read":false,"created_at":"2024-05-01T10:00:00Z"}],"unread_count":4}"#;
    let (base, server) = one_shot("200 OK", body).await;
    let api = ApiClient::new().with_base_url(base);

    let page = api
        .fetch_notifications(&Credential::new("tok-123"), NotificationQuery::unread(5))
        .await
        .unwrap();

    let head = server.await.unwrap().to_lowercase();
    assert!(head.starts_with("get /api/notifications?"), "{head}");
    assert!(head.contains("limit=5"), "{head}");
    assert!(head.contains("unread_only=true"), "{head}");
    assert!(head.contains("authorization: bearer tok-123"), "{head}");

    assert_eq!(page.unread_count, 4);
    assert_eq!(page.notifications.len(), 1);
    assert_eq!(page.notifications[0].id.as_str(), "42");
}

#[tokio::test]
async fn mark_read_posts_to_the_item_path() {
    let (base, server) = one_shot("204 No Content", "").await;
    let api = ApiClient::new().with_base_url(format!("{base}/"));

    api.mark_read(&Credential::new("tok"), &"ord/7".into())
        .await
        .unwrap();

    let head = server.await.unwrap();
    assert!(
        head.starts_with("POST /api/notifications/ord%2F7/read "),
        "{head}"
    );
}

#[tokio::test]
async fn rejected_mutation_carries_problem_detail() {
    let body = r#"{"title":"Forbidden","status":403,"detail":"Notifications belong to another user"}"#;
    let (base, server) = one_shot("403 Forbidden", body).await;
    let api = ApiClient::new().with_base_url(base);

    let err = api.mark_all_read(&Credential::new("tok")).await.unwrap_err();

    let head = server.await.unwrap();
    assert!(head.starts_with("POST /api/notifications/read-all "), "{head}");
    assert!(matches!(err, ApiError::Http { status: 403, .. }), "{err:?}");
    assert_eq!(err.user_message(), "Notifications belong to another user");
}
