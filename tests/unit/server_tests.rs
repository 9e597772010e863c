use follower_relay::{SequencerError, Server, ServerConfig, ServerError, ServerState};
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpStream;

#[cfg(test)]
mod tests {
    use super::*;

    type Subscriber = Lines<BufReader<TcpStream>>;

    fn test_config() -> ServerConfig {
        ServerConfig {
            bind_host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            event_port: 0,
            subscriber_port: 0,
            registration_timeout_ms: 2_000,
            shutdown_grace_ms: 2_000,
            ..ServerConfig::default()
        }
    }

    async fn subscribe(server: &Server, user: u64) -> Subscriber {
        let mut stream = TcpStream::connect(server.subscriber_addr()).await.unwrap();
        stream.write_all(format!("{user}\r\n").as_bytes()).await.unwrap();
        BufReader::new(stream).lines()
    }

    async fn wait_for_subscribers(server: &Server, expected: usize) {
        for _ in 0..200 {
            if server.status().await.unwrap().subscribers == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {expected} subscriber(s)");
    }

    async fn produce(server: &Server, lines: &str) -> TcpStream {
        let mut producer = TcpStream::connect(server.event_addr()).await.unwrap();
        producer.write_all(lines.as_bytes()).await.unwrap();
        producer
    }

    async fn next_line(subscriber: &mut Subscriber) -> Option<String> {
        tokio::time::timeout(Duration::from_secs(2), subscriber.next_line())
            .await
            .expect("subscriber read timed out")
            .unwrap_or(None)
    }

    async fn assert_silent(subscriber: &mut Subscriber) {
        let read = tokio::time::timeout(Duration::from_millis(100), subscriber.next_line()).await;
        assert!(read.is_err(), "unexpected delivery: {read:?}");
    }

    #[tokio::test]
    async fn test_out_of_order_events_delivered_in_sequence() {
        let mut server = Server::start(&test_config()).await.unwrap();
        let mut user2 = subscribe(&server, 2).await;
        wait_for_subscribers(&server, 1).await;

        let _producer = produce(&server, "2|F|1|2\n1|B\n").await;

        assert_eq!(next_line(&mut user2).await.as_deref(), Some("1|B"));
        assert_eq!(next_line(&mut user2).await.as_deref(), Some("2|F|1|2"));
        server.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_private_message_delivered_once() {
        let mut server = Server::start(&test_config()).await.unwrap();
        let mut user5 = subscribe(&server, 5).await;
        let mut user9 = subscribe(&server, 9).await;
        wait_for_subscribers(&server, 2).await;

        let _producer = produce(&server, "1|P|9|5\r\n").await;

        assert_eq!(next_line(&mut user5).await.as_deref(), Some("1|P|9|5"));
        assert_silent(&mut user5).await;
        assert_silent(&mut user9).await;
        server.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_status_update_reaches_connected_followers_only() {
        let mut server = Server::start(&test_config()).await.unwrap();
        let mut user3 = subscribe(&server, 3).await;
        wait_for_subscribers(&server, 1).await;

        let _producer = produce(&server, "1|F|3|7\n2|F|4|7\n3|S|7\n").await;

        assert_eq!(next_line(&mut user3).await.as_deref(), Some("3|S|7"));
        assert_silent(&mut user3).await;
        let status = server.status().await.unwrap();
        assert_eq!(status.cursor, 4);
        assert_eq!(status.followed_users, 1);
        server.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_line_keeps_connection_open() {
        let mut server = Server::start(&test_config()).await.unwrap();
        let mut user1 = subscribe(&server, 1).await;
        wait_for_subscribers(&server, 1).await;

        let mut producer = produce(&server, "abc|X|1|2\n").await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(server.status().await.unwrap().cursor, 1);

        producer.write_all(b"1|B\n").await.unwrap();
        assert_eq!(next_line(&mut user1).await.as_deref(), Some("1|B"));
        assert_eq!(server.status().await.unwrap().cursor, 2);
        server.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_sequence_shared_across_producer_connections() {
        let mut server = Server::start(&test_config()).await.unwrap();
        let mut user1 = subscribe(&server, 1).await;
        wait_for_subscribers(&server, 1).await;

        drop(produce(&server, "2|B\n").await);
        drop(produce(&server, "1|B\n").await);

        assert_eq!(next_line(&mut user1).await.as_deref(), Some("1|B"));
        assert_eq!(next_line(&mut user1).await.as_deref(), Some("2|B"));
        server.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_reregistration_replaces_previous_connection() {
        let mut server = Server::start(&test_config()).await.unwrap();
        let mut first = subscribe(&server, 1).await;
        wait_for_subscribers(&server, 1).await;

        let mut second = subscribe(&server, 1).await;
        assert_eq!(next_line(&mut first).await, None);
        assert_eq!(server.status().await.unwrap().subscribers, 1);

        let _producer = produce(&server, "1|B\n").await;
        assert_eq!(next_line(&mut second).await.as_deref(), Some("1|B"));
        server.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_registration_closes_connection() {
        let mut server = Server::start(&test_config()).await.unwrap();
        let mut stream = TcpStream::connect(server.subscriber_addr()).await.unwrap();
        stream.write_all(b"not-a-user\n").await.unwrap();

        let mut lines = BufReader::new(stream).lines();
        assert_eq!(next_line(&mut lines).await, None);
        assert_eq!(server.status().await.unwrap().subscribers, 0);
        server.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_disconnected_subscriber_is_forgotten() {
        let mut server = Server::start(&test_config()).await.unwrap();
        let user1 = subscribe(&server, 1).await;
        wait_for_subscribers(&server, 1).await;

        drop(user1);
        // A dead socket is noticed when a write to it fails.
        let mut producer = produce(&server, "").await;
        for sequence in 1..=100 {
            producer
                .write_all(format!("{sequence}|B\n").as_bytes())
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(10)).await;
            if server.status().await.unwrap().subscribers == 0 {
                break;
            }
        }
        assert_eq!(server.status().await.unwrap().subscribers, 0);
        server.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_half_closed_subscriber_keeps_receiving() {
        let mut server = Server::start(&test_config()).await.unwrap();
        let mut stream = TcpStream::connect(server.subscriber_addr()).await.unwrap();
        stream.write_all(b"5\n").await.unwrap();
        stream.shutdown().await.unwrap();
        wait_for_subscribers(&server, 1).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(server.status().await.unwrap().subscribers, 1);

        let _producer = produce(&server, "1|P|9|5\n").await;
        let mut user5 = BufReader::new(stream).lines();
        assert_eq!(next_line(&mut user5).await.as_deref(), Some("1|P|9|5"));
        server.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_silent_subscriber_times_out() {
        let config = ServerConfig {
            registration_timeout_ms: 50,
            ..test_config()
        };
        let mut server = Server::start(&config).await.unwrap();
        let stream = TcpStream::connect(server.subscriber_addr()).await.unwrap();

        let mut lines = BufReader::new(stream).lines();
        assert_eq!(next_line(&mut lines).await, None);
        assert_eq!(server.status().await.unwrap().subscribers, 0);
        server.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_closes_every_connection() {
        let mut server = Server::start(&test_config()).await.unwrap();
        let mut user1 = subscribe(&server, 1).await;
        wait_for_subscribers(&server, 1).await;
        let event_addr = server.event_addr();

        let producer = produce(&server, "5|B\n").await;
        let mut producer = BufReader::new(producer).lines();

        server.shutdown().await.unwrap();
        assert_eq!(server.state(), ServerState::Stopped);

        assert_eq!(next_line(&mut user1).await, None);
        assert_eq!(next_line(&mut producer).await, None);
        assert!(TcpStream::connect(event_addr).await.is_err());
        assert_eq!(server.status().await, Err(SequencerError::Shutdown));
        assert!(server.sender().is_none());

        // A second call has nothing left to do.
        server.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_run_until_stops_on_signal() {
        let server = Server::start(&test_config()).await.unwrap();
        let subscriber_addr = server.subscriber_addr();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let running = tokio::spawn(server.run_until(async {
            rx.await.ok();
        }));
        assert!(TcpStream::connect(subscriber_addr).await.is_ok());

        tx.send(()).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(3), running)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_run_until_stops_on_token() {
        let server = Server::start(&test_config()).await.unwrap();
        let token = server.shutdown_token();

        let running = tokio::spawn(server.run_until(std::future::pending::<()>()));
        token.cancel();

        let result = tokio::time::timeout(Duration::from_secs(3), running)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let taken = std::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let port = taken.local_addr().unwrap().port();
        let config = ServerConfig {
            event_port: port,
            ..test_config()
        };

        match Server::start(&config).await {
            Err(ServerError::Bind { role, addr, .. }) => {
                assert_eq!(role, "event");
                assert_eq!(addr.port(), port);
            }
            other => panic!("expected a bind error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_initial_sequence_from_config() {
        let config = ServerConfig {
            initial_sequence: 100,
            ..test_config()
        };
        let mut server = Server::start(&config).await.unwrap();
        let mut user1 = subscribe(&server, 1).await;
        wait_for_subscribers(&server, 1).await;

        let _producer = produce(&server, "99|B\n101|B\n100|B\n").await;

        assert_eq!(next_line(&mut user1).await.as_deref(), Some("100|B"));
        assert_eq!(next_line(&mut user1).await.as_deref(), Some("101|B"));
        assert_silent(&mut user1).await;
        server.shutdown().await.unwrap();
    }
}
