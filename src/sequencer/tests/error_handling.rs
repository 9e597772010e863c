/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 14/10/26
******************************************************************************/

//! Tests for error handling in the Sequencer.

#[cfg(test)]
mod tests {
    use super::super::{broadcast, drain, mailbox, private_message};
    use crate::mailbox::{Mailbox, MailboxId, OverflowPolicy};
    use crate::sequencer::{Dispatcher, IngestOutcome, Sequencer};
    use crate::{Event, EventKind, SequencerError, UserId};

    #[test]
    fn test_duplicate_sequence_rejected() {
        let mut dispatcher = Dispatcher::new(1);
        let (mailbox, mut rx) = mailbox(1);
        dispatcher.register(mailbox);

        assert_eq!(dispatcher.ingest(broadcast(2)), IngestOutcome::Buffered);
        let second = Event::with_payload(2, EventKind::Broadcast, "2|B|dup");
        assert_eq!(dispatcher.ingest(second), IngestOutcome::Duplicate);
        assert_eq!(dispatcher.status().pending, 1);

        dispatcher.ingest(broadcast(1));
        assert_eq!(drain(&mut rx), vec!["1|B", "2|B"]);
    }

    #[test]
    fn test_stale_sequence_rejected() {
        let mut dispatcher = Dispatcher::new(1);
        let (mailbox, mut rx) = mailbox(1);
        dispatcher.register(mailbox);

        dispatcher.ingest(broadcast(1));
        dispatcher.ingest(broadcast(2));
        let outcome = dispatcher.ingest(broadcast(1));

        assert_eq!(outcome, IngestOutcome::Stale);
        assert!(outcome.is_rejected());
        assert_eq!(dispatcher.cursor(), 3);
        assert_eq!(drain(&mut rx), vec!["1|B", "2|B"]);
    }

    #[test]
    fn test_sequence_below_initial_cursor_rejected() {
        let mut dispatcher = Dispatcher::new(100);
        assert_eq!(dispatcher.ingest(broadcast(1)), IngestOutcome::Stale);
        assert_eq!(dispatcher.status().pending, 0);
    }

    #[test]
    fn test_last_sequence_not_released_twice() {
        let mut dispatcher = Dispatcher::new(u64::MAX);
        let (mailbox, mut rx) = mailbox(1);
        dispatcher.register(mailbox);

        assert_eq!(
            dispatcher.ingest(broadcast(u64::MAX)),
            IngestOutcome::Released { count: 1 }
        );
        assert_eq!(dispatcher.ingest(broadcast(u64::MAX)), IngestOutcome::Stale);
        assert_eq!(dispatcher.status().dispatched, 1);
        assert_eq!(drain(&mut rx), vec![format!("{}|B", u64::MAX)]);
    }

    #[test]
    fn test_private_message_to_unregistered_user() {
        let mut dispatcher = Dispatcher::new(1);
        let (mailbox, mut rx) = mailbox(1);
        dispatcher.register(mailbox);

        assert_eq!(
            dispatcher.ingest(private_message(1, 1, 42)),
            IngestOutcome::Released { count: 1 }
        );
        assert!(drain(&mut rx).is_empty());
        assert_eq!(dispatcher.cursor(), 2);
    }

    #[test]
    fn test_drop_newest_overflow_keeps_subscriber() {
        let mut dispatcher = Dispatcher::new(1);
        let (slow, mut slow_rx) = Mailbox::channel(UserId(1), 1, OverflowPolicy::DropNewest);
        let (fast, mut fast_rx) = mailbox(2);
        dispatcher.register(slow);
        dispatcher.register(fast);

        dispatcher.ingest(broadcast(1));
        dispatcher.ingest(broadcast(2));

        assert_eq!(drain(&mut slow_rx), vec!["1|B"]);
        assert_eq!(drain(&mut fast_rx), vec!["1|B", "2|B"]);
        assert!(dispatcher.is_registered(UserId(1)));

        dispatcher.ingest(broadcast(3));
        assert_eq!(drain(&mut slow_rx), vec!["3|B"]);
    }

    #[test]
    fn test_disconnect_overflow_removes_subscriber() {
        let mut dispatcher = Dispatcher::new(1);
        let (slow, _slow_rx) = Mailbox::channel(UserId(1), 1, OverflowPolicy::Disconnect);
        let handle = slow.clone();
        dispatcher.register(slow);

        dispatcher.ingest(broadcast(1));
        dispatcher.ingest(broadcast(2));

        assert!(handle.is_closed());
        assert!(!dispatcher.is_registered(UserId(1)));
        assert_eq!(dispatcher.status().subscribers, 0);
        assert_eq!(dispatcher.cursor(), 3);
    }

    #[test]
    fn test_closed_mailbox_removed_on_delivery() {
        let mut dispatcher = Dispatcher::new(1);
        let (gone, gone_rx) = mailbox(1);
        dispatcher.register(gone);
        drop(gone_rx);

        dispatcher.ingest(broadcast(1));

        assert!(!dispatcher.is_registered(UserId(1)));
    }

    #[test]
    fn test_deregister_ignores_replaced_mailbox() {
        let mut dispatcher = Dispatcher::new(1);
        let (first, _first_rx) = mailbox(1);
        let first_id = first.id();
        let (second, mut second_rx) = mailbox(1);
        dispatcher.register(first);
        dispatcher.register(second);

        assert!(!dispatcher.deregister(UserId(1), first_id));
        assert!(!dispatcher.deregister(UserId(1), MailboxId::new()));
        assert!(dispatcher.is_registered(UserId(1)));

        dispatcher.ingest(broadcast(1));
        assert_eq!(drain(&mut second_rx), vec!["1|B"]);
    }

    #[test]
    fn test_reregistration_closes_previous_mailbox() {
        let mut dispatcher = Dispatcher::new(1);
        let (first, mut first_rx) = mailbox(1);
        let first_handle = first.clone();
        let (second, mut second_rx) = mailbox(1);

        assert!(!dispatcher.register(first));
        assert!(dispatcher.register(second));
        assert!(first_handle.is_closed());
        assert_eq!(dispatcher.status().subscribers, 1);

        dispatcher.ingest(broadcast(1));
        assert!(drain(&mut first_rx).is_empty());
        assert_eq!(drain(&mut second_rx), vec!["1|B"]);
    }

    #[test]
    fn test_close_all_closes_every_mailbox() {
        let mut dispatcher = Dispatcher::new(1);
        let mut handles = Vec::new();
        let mut receivers = Vec::new();
        for user in 1..=3 {
            let (mailbox, rx) = mailbox(user);
            handles.push(mailbox.clone());
            receivers.push(rx);
            dispatcher.register(mailbox);
        }
        assert!(!handles.iter().any(Mailbox::is_closed));

        dispatcher.close_all();

        assert!(handles.iter().all(Mailbox::is_closed));
        assert_eq!(dispatcher.status().subscribers, 0);
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_fails() {
        let token = tokio_util::sync::CancellationToken::new();
        let sequencer = Sequencer::new(1).with_shutdown(token.clone());
        let sender = sequencer.sender();
        let handle = sequencer.spawn();

        assert!(sender.submit(broadcast(1)).await.unwrap().is_accepted());
        token.cancel();
        let status = handle.wait().await.unwrap();
        assert_eq!(status.cursor, 2);

        assert_eq!(sender.submit(broadcast(2)).await, Err(SequencerError::Shutdown));
        assert_eq!(sender.status().await, Err(SequencerError::Shutdown));
        assert!(sender.is_closed());
    }

    #[tokio::test]
    async fn test_register_after_shutdown_closes_mailbox() {
        let token = tokio_util::sync::CancellationToken::new();
        let sequencer = Sequencer::new(1).with_shutdown(token.clone());
        let sender = sequencer.sender();
        let handle = sequencer.spawn();
        token.cancel();
        handle.wait().await.unwrap();

        let (mailbox, _rx) = mailbox(1);
        let probe = mailbox.clone();
        assert_eq!(sender.register(mailbox).await, Err(SequencerError::Shutdown));
        assert!(probe.is_closed());
    }
}
