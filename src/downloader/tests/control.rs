use super::*;

#[tokio::test]
async fn test_start_download_runs_to_completion() {
    let (manager, services, _temp_dir) = create_test_manager(3).await;
    let id = services.add_game(1, "Example Game");

    let admission = manager
        .start_download(manager.new_request(id, "Example Game"))
        .await
        .unwrap();
    assert!(matches!(admission, Admission::Started { .. }));

    let view = wait_for_terminal(&manager, id).await;
    assert_eq!(view.state, TaskState::Completed);
    assert_eq!(view.progress, 1.0);
    assert_eq!(
        view.status_text,
        format!("Download completed: {}", view.download_path.display())
    );
    assert!(view.details_text.is_empty());
    assert!(view.file_status_text.is_empty());
    assert!(view.download_path.ends_with("Example Game"));
}

#[tokio::test]
async fn test_start_returns_instance_id_of_new_task() {
    let (manager, services, _temp_dir) = create_test_manager(3).await;
    let id = services.add_game(1, "Example");
    services
        .transfer
        .on(id, TransferBehavior::WaitForCancel);

    let Admission::Started { instance_id } = manager
        .start_download(manager.new_request(id, "Example"))
        .await
        .unwrap()
    else {
        panic!("expected the download to start");
    };
    assert_eq!(manager.task(id).unwrap().instance_id, instance_id);

    manager.cancel(id).unwrap();
    wait_for_terminal(&manager, id).await;
}

#[tokio::test]
async fn test_duplicate_start_is_rejected_without_new_task() {
    let (manager, services, _temp_dir) = create_test_manager(3).await;
    let id = services.add_game(1, "Example");
    services
        .transfer
        .on(id, TransferBehavior::WaitForCancel);

    manager
        .start_download(manager.new_request(id, "Example"))
        .await
        .unwrap();
    let err = manager
        .start_download(manager.new_request(id, "Example"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Download(DownloadError::InProgress { game_id: 1 })
    ));
    assert_eq!(manager.list_tasks().len(), 1);
    assert!(manager.is_active(id));

    manager.cancel(id).unwrap();
    wait_for_terminal(&manager, id).await;
}

#[tokio::test]
async fn test_validation_rejects_before_admission() {
    let (manager, services, _temp_dir) = create_test_manager(3).await;
    let id = services.add_game(1, "Example");

    let mut too_many = manager.new_request(id, "Example");
    too_many.threads = 21;
    let mut zero = manager.new_request(id, "Example");
    zero.threads = 0;
    let no_path = DownloadRequest::new(id, "Example", "");
    let no_title = manager.new_request(id, "   ");
    let mut bad_platform = manager.new_request(id, "Example");
    bad_platform.platform = "amiga".into();

    for (request, field) in [
        (too_many, "threads"),
        (zero, "threads"),
        (no_path, "download_path"),
        (no_title, "title"),
        (bad_platform, "platform"),
    ] {
        match manager.start_download(request).await {
            Err(Error::Validation { field: f, .. }) => assert_eq!(f, field),
            other => panic!("expected validation error for {}, got {:?}", field, other),
        }
    }

    assert!(manager.list_tasks().is_empty());
    assert!(!manager.is_active(id));
    assert_eq!(services.auth.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_platform_is_case_insensitive() {
    let (manager, services, _temp_dir) = create_test_manager(3).await;
    let id = services.add_game(1, "Example");
    let mut request = manager.new_request(id, "Example");
    request.platform = "Linux".into();

    manager.start_download(request).await.unwrap();
    wait_for_terminal(&manager, id).await;

    let jobs = services.transfer.jobs.lock().unwrap();
    assert_eq!(jobs[0].platform, "linux");
}

#[tokio::test]
async fn test_queue_is_fifo_and_released_slot_goes_to_oldest() {
    let (manager, services, _temp_dir) = create_test_manager(1).await;
    let first = services.add_game(1, "First");
    let second = services.add_game(2, "Second");
    let third = services.add_game(3, "Third");
    services
        .transfer
        .on(first, TransferBehavior::WaitForCancel);
    services
        .transfer
        .on(second, TransferBehavior::WaitForCancel);

    manager
        .start_download(manager.new_request(first, "First"))
        .await
        .unwrap();
    assert_eq!(
        manager
            .start_download(manager.new_request(second, "Second"))
            .await
            .unwrap(),
        Admission::Queued { position: 1 }
    );
    assert_eq!(
        manager
            .start_download(manager.new_request(third, "Third"))
            .await
            .unwrap(),
        Admission::Queued { position: 2 }
    );
    assert_eq!(manager.queued(), vec![second, third]);
    assert!(manager.task(second).is_none());

    manager.cancel(first).unwrap();
    let view = wait_for_terminal(&manager, first).await;
    assert_eq!(view.state, TaskState::Cancelled);

    wait_for_state(&manager, second, TaskState::Downloading).await;
    assert!(manager.is_active(second));
    assert!(!manager.is_active(first));
    assert_eq!(manager.queued(), vec![third]);

    manager.cancel(second).unwrap();
    let view = wait_for_terminal(&manager, third).await;
    assert_eq!(view.state, TaskState::Completed);
}

#[tokio::test]
async fn test_queued_duplicate_is_rejected() {
    let (manager, services, _temp_dir) = create_test_manager(1).await;
    let first = services.add_game(1, "First");
    let second = services.add_game(2, "Second");
    services
        .transfer
        .on(first, TransferBehavior::WaitForCancel);

    manager
        .start_download(manager.new_request(first, "First"))
        .await
        .unwrap();
    manager
        .start_download(manager.new_request(second, "Second"))
        .await
        .unwrap();

    let err = manager
        .start_download(manager.new_request(second, "Second"))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "download_in_progress");
    assert_eq!(manager.queued(), vec![second]);

    manager.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_cancel_queued_request_never_creates_task() {
    let (manager, services, _temp_dir) = create_test_manager(1).await;
    let first = services.add_game(1, "First");
    let second = services.add_game(2, "Second");
    services
        .transfer
        .on(first, TransferBehavior::WaitForCancel);
    let mut events = manager.subscribe();

    manager
        .start_download(manager.new_request(first, "First"))
        .await
        .unwrap();
    manager
        .start_download(manager.new_request(second, "Second"))
        .await
        .unwrap();
    manager.cancel(second).unwrap();

    assert!(manager.queued().is_empty());
    assert!(
        drain_events(&mut events)
            .iter()
            .any(|e| matches!(e, Event::Removed { game_id } if *game_id == second))
    );

    manager.cancel(first).unwrap();
    wait_for_terminal(&manager, first).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(manager.task(second).is_none());
}

#[tokio::test]
async fn test_cancel_unknown_game_is_not_found() {
    let (manager, _services, _temp_dir) = create_test_manager(1).await;
    let err = manager.cancel(GameId(404)).unwrap_err();
    assert!(matches!(
        err,
        Error::Download(DownloadError::NotFound { game_id: 404 })
    ));
}

#[tokio::test]
async fn test_cancel_finished_download_is_invalid_state() {
    let (manager, services, _temp_dir) = create_test_manager(1).await;
    let id = services.add_game(1, "Example");
    manager
        .start_download(manager.new_request(id, "Example"))
        .await
        .unwrap();
    wait_for_terminal(&manager, id).await;

    let err = manager.cancel(id).unwrap_err();
    assert_eq!(err.error_code(), "invalid_state");
    assert_eq!(manager.task(id).unwrap().state, TaskState::Completed);
}

#[tokio::test]
async fn test_same_game_can_be_downloaded_again() {
    let (manager, services, _temp_dir) = create_test_manager(1).await;
    let id = services.add_game(1, "Example");

    manager
        .start_download(manager.new_request(id, "Example"))
        .await
        .unwrap();
    let first = wait_for_terminal(&manager, id).await;

    manager
        .start_download(manager.new_request(id, "Example"))
        .await
        .unwrap();
    let second = wait_for(&manager, id, |v| {
        v.instance_id != first.instance_id && v.state.is_terminal()
    })
    .await;

    assert_eq!(second.state, TaskState::Completed);
    assert_eq!(manager.list_tasks().len(), 2);
}

#[tokio::test]
async fn test_clear_finished_keeps_running_tasks() {
    let (manager, services, temp_dir) = create_test_manager(3).await;
    let done = services.add_game(1, "Done");
    let running = services.add_game(2, "Running");
    services
        .transfer
        .on(running, TransferBehavior::WaitForCancel);

    manager
        .start_download(manager.new_request(done, "Done"))
        .await
        .unwrap();
    wait_for_terminal(&manager, done).await;
    manager
        .start_download(manager.new_request(running, "Running"))
        .await
        .unwrap();
    wait_for_state(&manager, running, TaskState::Downloading).await;

    let mut events = manager.subscribe();
    assert_eq!(manager.clear_finished().await.unwrap(), 1);

    let tasks = manager.list_tasks();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].game_id, running);
    assert!(matches!(
        drain_events(&mut events).last(),
        Some(Event::HistoryCleared { removed: 1 })
    ));

    let history = std::fs::read_to_string(temp_dir.path().join("download_history.json")).unwrap();
    let records: Vec<serde_json::Value> = serde_json::from_str(&history).unwrap();
    assert!(records.is_empty());

    manager.cancel(running).unwrap();
    wait_for_terminal(&manager, running).await;
}

#[tokio::test]
async fn test_lifecycle_events_in_order() {
    let (manager, services, _temp_dir) = create_test_manager(3).await;
    let id = services.add_game(1, "Example");
    let mut events = manager.subscribe();

    manager
        .start_download(manager.new_request(id, "Example"))
        .await
        .unwrap();
    wait_for_terminal(&manager, id).await;

    let kinds: Vec<&str> = drain_events(&mut events)
        .iter()
        .filter_map(|e| match e {
            Event::Started { .. } => Some("started"),
            Event::Downloading { .. } => Some("downloading"),
            Event::Completed { .. } => Some("completed"),
            _ => None,
        })
        .collect();
    assert_eq!(kinds, vec!["started", "downloading", "completed"]);
}

#[tokio::test]
async fn test_concurrent_starts_respect_cap() {
    let (manager, services, _temp_dir) = create_test_manager(2).await;
    let ids: Vec<GameId> = (1..=5)
        .map(|i| services.add_game(i, &format!("Game {}", i)))
        .collect();

    let results = futures::future::join_all(
        ids.iter()
            .map(|id| manager.start_download(manager.new_request(*id, format!("Game {}", id)))),
    )
    .await;

    let started = results
        .iter()
        .filter(|r| matches!(r, Ok(Admission::Started { .. })))
        .count();
    let queued = results
        .iter()
        .filter(|r| matches!(r, Ok(Admission::Queued { .. })))
        .count();
    assert_eq!(started, 2);
    assert_eq!(queued, 3);

    for id in &ids {
        let view = wait_for_terminal(&manager, *id).await;
        assert_eq!(view.state, TaskState::Completed);
    }
    assert!(manager.queued().is_empty());
}
