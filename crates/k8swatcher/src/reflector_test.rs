//! Unit tests for the reflector state machine

#[cfg(test)]
mod tests {
    use crate::config::{WatchConfig, WatcherSettings};
    use crate::model::{WatchEvent, WatchEventType};
    use crate::reflector::{ResourceWatcher, WatcherState};
    use crate::test_utils::*;
    use futures::StreamExt;
    use resource_client::mock::{bookmark, object, object_list};
    use resource_client::{
        Call, ClientError, MockResourceClient, QueryParams, ResourceScope, WatchItem, WatchScript,
    };
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    fn pods() -> MockResourceClient {
        MockResourceClient::new("Pod", ResourceScope::Namespaced)
    }

    fn watcher(mock: &MockResourceClient, config: WatchConfig) -> ResourceWatcher {
        ResourceWatcher::new(config, Arc::new(mock.clone()), &fast_settings())
    }

    async fn next(w: &mut ResourceWatcher) -> WatchEvent {
        tokio::time::timeout(Duration::from_secs(2), w.next_event())
            .await
            .expect("watcher produced no event")
    }

    fn list_call() -> Call {
        Call::List(QueryParams::default())
    }

    fn watch_call(cursor: &str) -> Call {
        Call::Watch { params: QueryParams::default(), from_cursor: cursor.to_string() }
    }

    fn ev(t: WatchEventType, rv: &str, uid: Option<&str>) -> (WatchEventType, String, Option<String>) {
        (t, rv.to_string(), uid.map(str::to_string))
    }

    #[tokio::test]
    async fn test_list_modify_then_cursor_expiry_relists() {
        let mock = pods();
        mock.push_list(object_list(
            "Pod",
            "100",
            vec![object("Pod", "A", "a", "97"), object("Pod", "B", "b", "98"), object("Pod", "C", "c", "99")],
        ))
        .push_list(object_list("Pod", "90", vec![object("Pod", "A", "a", "97")]))
        .push_watch(WatchScript::items(vec![
            Ok(WatchItem::Modified(object("Pod", "B", "b", "101"))),
            Err(ClientError::CursorExpired("too old resource version: 100 (150)".to_string())),
        ]));
        let mut w = watcher(&mock, WatchConfig::new("pods", "Pod"));

        let mut events = Vec::new();
        for _ in 0..5 {
            events.push(next(&mut w).await);
        }
        assert_eq!(
            summary(&events),
            vec![
                ev(WatchEventType::Loaded, "100", Some("A")),
                ev(WatchEventType::Loaded, "100", Some("B")),
                ev(WatchEventType::Loaded, "100", Some("C")),
                ev(WatchEventType::Modified, "101", Some("B")),
                ev(WatchEventType::Loaded, "90", Some("A")),
            ]
        );
        let modified = events[3].k8s_tracked_object.as_ref().unwrap();
        assert_eq!(modified.name, "b");
        assert_eq!(modified.kind, "Pod");
        assert!(events.iter().all(|e| e.watch_id == "pods"));
        assert_eq!(mock.calls(), vec![list_call(), watch_call("100"), list_call()]);
    }

    #[tokio::test]
    async fn test_step_transitions() {
        let mock = pods();
        mock.push_list(object_list("Pod", "100", vec![object("Pod", "A", "a", "99")]));
        let mut w = watcher(&mock, WatchConfig::new("pods", "Pod"));
        assert_eq!(w.state(), &WatcherState::Initial);

        assert!(w.step().await.unwrap().is_none());
        assert_eq!(w.state(), &WatcherState::Listing { list_cursor: "100".to_string() });
        assert_eq!(w.resource_version(), None);

        let loaded = w.step().await.unwrap().unwrap();
        assert_eq!(loaded.event_type, WatchEventType::Loaded);

        assert!(w.step().await.unwrap().is_none());
        assert_eq!(w.state(), &WatcherState::Watching);
        assert_eq!(w.resource_version(), Some("100"));
    }

    #[tokio::test]
    async fn test_bookmark_emitted_when_not_suppressed() {
        let mock = pods();
        mock.push_list(object_list("Pod", "100", vec![]))
            .push_watch(WatchScript::items(vec![Ok(bookmark("150"))]).then_hang());
        let mut w = watcher(&mock, WatchConfig::new("pods", "Pod").with_suppress_bookmarks(false));

        let event = next(&mut w).await;
        assert_eq!(event.event_type, WatchEventType::Bookmark);
        assert_eq!(event.resource_version, "150");
        assert!(event.k8s_tracked_object.is_none());
        assert_eq!(w.resource_version(), Some("150"));
    }

    #[tokio::test]
    async fn test_suppressed_bookmark_still_advances_cursor() {
        let mock = pods();
        mock.push_list(object_list("Pod", "100", vec![]))
            .push_watch(WatchScript::items(vec![Ok(bookmark("150"))]))
            .push_watch(WatchScript::items(vec![Ok(WatchItem::Added(object("Pod", "X", "x", "151")))]));
        let mut w = watcher(&mock, WatchConfig::new("pods", "Pod"));

        let event = next(&mut w).await;
        assert_eq!(event.event_type, WatchEventType::Added);
        assert_eq!(event.resource_version, "151");
        // The stream closed after the bookmark and was re-established from it.
        assert_eq!(mock.calls(), vec![list_call(), watch_call("100"), watch_call("150")]);
    }

    #[tokio::test]
    async fn test_cursor_non_decreasing_without_expiry() {
        let mock = pods();
        mock.push_list(object_list(
            "Pod",
            "100",
            vec![object("Pod", "A", "a", "90"), object("Pod", "B", "b", "95"), object("Pod", "C", "c", "99")],
        ))
        .push_watch(WatchScript::items(vec![
            Ok(WatchItem::Added(object("Pod", "D", "d", "101"))),
            Ok(bookmark("105")),
        ]))
        .push_watch(WatchScript::items(vec![
            Ok(WatchItem::Modified(object("Pod", "A", "a", "107"))),
            Ok(WatchItem::Deleted(object("Pod", "C", "c", "108"))),
        ]));
        let mut w = watcher(&mock, WatchConfig::new("pods", "Pod").with_suppress_bookmarks(false));

        let mut cursors = Vec::new();
        for _ in 0..7 {
            cursors.push(next(&mut w).await.resource_version.parse::<u64>().unwrap());
        }
        assert_eq!(cursors, vec![100, 100, 100, 101, 105, 107, 108]);
        assert!(cursors.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[tokio::test]
    async fn test_same_uid_overwrites_single_entry() {
        let mock = pods();
        mock.push_list(object_list("Pod", "10", vec![object("Pod", "A", "a", "5")]))
            .push_watch(WatchScript::items(vec![
                Ok(WatchItem::Modified(object("Pod", "A", "a", "11"))),
                Ok(WatchItem::Modified(object("Pod", "A", "a-renamed", "12"))),
                Ok(WatchItem::Added(object("Pod", "B", "b", "13"))),
                Ok(WatchItem::Deleted(object("Pod", "B", "b", "14"))),
            ]));
        let mut w = watcher(&mock, WatchConfig::new("pods", "Pod"));

        for _ in 0..5 {
            next(&mut w).await;
        }
        let tracked = w.tracked_objects();
        assert_eq!(tracked.len(), 2);
        assert_eq!(tracked["A"].resource_version, "12");
        assert_eq!(tracked["A"].name, "a-renamed");
        // The deleted object's final snapshot overwrites its entry.
        assert_eq!(tracked["B"].resource_version, "14");
    }

    #[tokio::test]
    async fn test_deleted_overwrites_listed_entry() {
        let mock = pods();
        mock.push_list(object_list("Pod", "9", vec![object("Pod", "A", "a", "9")]))
            .push_watch(WatchScript::items(vec![Ok(WatchItem::Deleted(object("Pod", "A", "a", "11")))]));
        let mut w = watcher(&mock, WatchConfig::new("pods", "Pod"));

        next(&mut w).await;
        let deleted = next(&mut w).await;
        assert_eq!(deleted.event_type, WatchEventType::Deleted);
        assert_eq!(w.tracked_objects().len(), 1);
        assert_eq!(w.tracked_objects()["A"].resource_version, "11");
    }

    #[tokio::test]
    async fn test_list_api_error_is_retried() {
        let mock = pods();
        mock.push_list_error(ClientError::Api("forbidden".to_string()))
            .push_list(object_list("Pod", "7", vec![object("Pod", "A", "a", "7")]));
        let mut w = watcher(&mock, WatchConfig::new("pods", "Pod"));

        let event = next(&mut w).await;
        assert_eq!(event.event_type, WatchEventType::Loaded);
        assert_eq!(mock.calls(), vec![list_call(), list_call()]);
    }

    #[tokio::test]
    async fn test_stream_error_rewatches_from_same_cursor() {
        let mock = pods();
        mock.push_list(object_list("Pod", "10", vec![]))
            .push_watch(WatchScript::items(vec![Err(ClientError::Api("stream reset".to_string()))]))
            .push_watch(WatchScript::items(vec![Ok(WatchItem::Modified(object("Pod", "A", "a", "11")))]));
        let mut w = watcher(&mock, WatchConfig::new("pods", "Pod"));

        let event = next(&mut w).await;
        assert_eq!(event.event_type, WatchEventType::Modified);
        assert_eq!(mock.calls(), vec![list_call(), watch_call("10"), watch_call("10")]);
    }

    #[tokio::test]
    async fn test_rejected_watch_with_expired_cursor_relists() {
        let mock = pods();
        mock.push_list(object_list("Pod", "10", vec![]))
            .push_list(object_list("Pod", "20", vec![object("Pod", "A", "a", "18")]))
            .push_watch(WatchScript::reject(ClientError::CursorExpired("gone".to_string())));
        let mut w = watcher(&mock, WatchConfig::new("pods", "Pod"));

        let event = next(&mut w).await;
        assert_eq!(event.event_type, WatchEventType::Loaded);
        assert_eq!(event.resource_version, "20");
        assert_eq!(mock.calls(), vec![list_call(), watch_call("10"), list_call()]);
    }

    #[tokio::test]
    async fn test_relist_resynchronises_tracked_objects() {
        let mock = pods();
        mock.push_list(object_list("Pod", "10", vec![object("Pod", "A", "a", "9"), object("Pod", "B", "b", "9")]))
            .push_list(object_list("Pod", "20", vec![object("Pod", "A", "a", "19")]))
            .push_watch(WatchScript::items(vec![Err(ClientError::CursorExpired("gone".to_string()))]));
        let mut w = watcher(&mock, WatchConfig::new("pods", "Pod"));

        for _ in 0..3 {
            next(&mut w).await;
        }
        assert_eq!(w.tracked_objects().len(), 1);
        assert!(w.tracked_objects().contains_key("A"));
    }

    #[tokio::test]
    async fn test_list_kind_and_raw_object() {
        let mock = pods();
        let mut item = object("Pod", "A", "a", "9");
        item.kind = String::new();
        mock.push_list(object_list("Pod", "10", vec![item]));
        let mut w = watcher(&mock, WatchConfig::new("pods", "Pod").with_include_k8s_objects(true));

        let event = next(&mut w).await;
        let tracked = event.k8s_tracked_object.unwrap();
        assert_eq!(tracked.kind, "Pod");
        assert_eq!(tracked.api_version, "v1");
        let raw = tracked.k8s_object.unwrap();
        assert_eq!(raw["metadata"]["uid"], "A");
        assert!(raw["metadata"].get("managedFields").is_none());
    }

    #[tokio::test]
    async fn test_into_stream_yields_events_lazily() {
        let mock = pods();
        mock.push_list(object_list("Pod", "3", vec![object("Pod", "A", "a", "1"), object("Pod", "B", "b", "2")]));
        let stream = watcher(&mock, WatchConfig::new("pods", "Pod")).into_stream();
        let events: Vec<_> = tokio::time::timeout(Duration::from_secs(2), stream.take(2).collect())
            .await
            .unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(mock.calls(), vec![list_call()]);
    }

    fn slow_retry_watcher(mock: &MockResourceClient) -> ResourceWatcher {
        let settings = WatcherSettings {
            retry_min: Duration::from_secs(1),
            retry_max: Duration::from_secs(30),
            ..fast_settings()
        };
        ResourceWatcher::new(WatchConfig::new("pods", "Pod"), Arc::new(mock.clone()), &settings)
    }

    #[tokio::test(start_paused = true)]
    async fn test_api_errors_back_off_fibonacci_and_reset_on_event() {
        let mock = pods();
        mock.push_list_error(ClientError::Api("unavailable".to_string()))
            .push_list_error(ClientError::Api("unavailable".to_string()))
            .push_list_error(ClientError::Api("unavailable".to_string()))
            .push_list(object_list("Pod", "10", vec![object("Pod", "A", "a", "10")]))
            .push_watch(WatchScript::reject(ClientError::Api("unavailable".to_string())))
            .push_watch(WatchScript::items(vec![Ok(WatchItem::Modified(object("Pod", "A", "a", "11")))]).then_hang());
        let mut w = slow_retry_watcher(&mock);

        // 1s + 1s + 2s before the list succeeds.
        let start = Instant::now();
        assert_eq!(w.next_event().await.event_type, WatchEventType::Loaded);
        assert_eq!(start.elapsed(), Duration::from_secs(4));

        // The delivered event reset the delay back to the minimum.
        let start = Instant::now();
        assert_eq!(w.next_event().await.event_type, WatchEventType::Modified);
        assert_eq!(start.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cursor_expiry_relists_without_delay() {
        let mock = pods();
        mock.push_list(object_list("Pod", "10", vec![]))
            .push_list(object_list("Pod", "20", vec![object("Pod", "A", "a", "20")]))
            .push_watch(WatchScript::reject(ClientError::CursorExpired("too old".to_string())));
        let mut w = slow_retry_watcher(&mock);

        let start = Instant::now();
        let event = w.next_event().await;
        assert_eq!(event.event_type, WatchEventType::Loaded);
        assert_eq!(event.resource_version, "20");
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clean_watch_close_resets_backoff() {
        let mock = pods();
        let api_error = || WatchScript::reject(ClientError::Api("unavailable".to_string()));
        mock.push_list(object_list("Pod", "10", vec![]))
            .push_watch(api_error())
            .push_watch(api_error())
            .push_watch(api_error())
            .push_watch(WatchScript::items(vec![]))
            .push_watch(api_error())
            .push_watch(WatchScript::items(vec![Ok(WatchItem::Added(object("Pod", "A", "a", "11")))]).then_hang());
        let mut w = slow_retry_watcher(&mock);

        // 1s + 1s + 2s, then the clean close resets so the next failure waits 1s, not 3s.
        let start = Instant::now();
        assert_eq!(w.next_event().await.event_type, WatchEventType::Added);
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }
}
