use chrono::{NaiveDate, NaiveDateTime};
use due_date_scheduler::{
    AssignmentSource, BoardError, CalendarPolicy, DueDateBoard, DueDateState, PolicyError,
    RequestTask,
};

fn d(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn at(y: i32, m: u32, day: u32, h: u32) -> NaiveDateTime {
    d(y, m, day).and_hms_opt(h, 0, 0).unwrap()
}

fn board_with_two_requests() -> DueDateBoard {
    let mut board = DueDateBoard::new(CalendarPolicy::default());
    let tensile = RequestTask::new(1, "Tensile test", at(2023, 10, 13, 0), 20.0);
    let hardness = RequestTask::new(2, "Hardness test", at(2023, 10, 16, 0), 5.0);
    board.add_task(tensile.with_request_no("TR-001")).unwrap();
    board.add_task(hardness.with_request_no("TR-002")).unwrap();
    board.recompute().unwrap();
    board
}

fn due_of(board: &DueDateBoard, id: i32) -> DueDateState {
    board.find_task(id).unwrap().due
}

#[test]
fn recompute_suggests_due_dates_for_unscheduled_tasks() {
    let board = board_with_two_requests();
    assert_eq!(
        due_of(&board, 1),
        DueDateState::Suggested {
            date: at(2023, 10, 18, 17)
        }
    );
    assert_eq!(
        due_of(&board, 2),
        DueDateState::Suggested {
            date: at(2023, 10, 17, 17)
        }
    );

    let summary = board.summary();
    assert_eq!(summary.task_count, 2);
    assert_eq!(summary.suggested_count, 2);
    assert_eq!(summary.assigned_count, 0);
    assert_eq!(summary.latest_due, Some(at(2023, 10, 18, 17)));
    assert_eq!(
        summary.to_cli_summary(),
        "tasks=2 suggested=2 assigned=0 latest_due=2023-10-18 17:00"
    );
}

#[test]
fn policy_change_refreshes_suggestions_but_keeps_assignments() {
    let mut board = board_with_two_requests();
    board
        .assign_due_date(2, at(2023, 10, 20, 12), AssignmentSource::Manual)
        .unwrap();

    let summary = board
        .update_policy_with(|policy| {
            policy.add_exceptional_day(d(2023, 10, 16));
        })
        .unwrap();

    assert_eq!(summary.suggested_count, 1);
    assert_eq!(summary.assigned_count, 1);
    assert_eq!(
        due_of(&board, 1),
        DueDateState::Suggested {
            date: at(2023, 10, 19, 17)
        }
    );
    assert_eq!(
        due_of(&board, 2),
        DueDateState::Assigned {
            date: at(2023, 10, 20, 12),
            source: AssignmentSource::Manual
        }
    );
}

#[test]
fn invalid_policy_leaves_board_untouched() {
    let mut board = board_with_two_requests();
    let err = board.set_policy(CalendarPolicy::new(true, 17, 8)).unwrap_err();
    assert_eq!(
        err,
        BoardError::Policy(PolicyError::EmptyWorkingWindow { start: 17, end: 8 })
    );
    assert_eq!(board.policy(), &CalendarPolicy::default());
    assert_eq!(
        due_of(&board, 1),
        DueDateState::Suggested {
            date: at(2023, 10, 18, 17)
        }
    );
}

#[test]
fn switching_to_wall_clock_recomputes_from_request_time() {
    let mut board = board_with_two_requests();
    board.set_policy(CalendarPolicy::wall_clock()).unwrap();
    assert_eq!(
        due_of(&board, 1),
        DueDateState::Suggested {
            date: at(2023, 10, 13, 20)
        }
    );
}

#[test]
fn bulk_assign_is_all_or_nothing() {
    let mut board = board_with_two_requests();
    let err = board.bulk_assign(&[1, 99], at(2023, 10, 25, 17)).unwrap_err();
    assert_eq!(err, BoardError::TaskNotFound(99));
    assert!(!board.find_task(1).unwrap().due.is_assigned());

    let count = board.bulk_assign(&[1, 2], at(2023, 10, 25, 17)).unwrap();
    assert_eq!(count, 2);
    for id in [1, 2] {
        assert_eq!(
            due_of(&board, id),
            DueDateState::Assigned {
                date: at(2023, 10, 25, 17),
                source: AssignmentSource::Bulk
            }
        );
    }
}

#[test]
fn dropping_on_a_day_assigns_end_of_working_hours() {
    let mut board = board_with_two_requests();
    let date = board.drop_on_day(1, d(2023, 10, 20)).unwrap();
    assert_eq!(date, at(2023, 10, 20, 17));
    assert_eq!(
        due_of(&board, 1),
        DueDateState::Assigned {
            date,
            source: AssignmentSource::CalendarDrop
        }
    );
    assert_eq!(board.tasks_due_on(d(2023, 10, 20)).len(), 1);
}

#[test]
fn assignment_before_request_date_is_rejected() {
    let mut board = board_with_two_requests();
    let err = board
        .assign_due_date(2, at(2023, 10, 13, 17), AssignmentSource::Manual)
        .unwrap_err();
    assert!(matches!(err, BoardError::InvalidTask(_)));
    assert!(!board.find_task(2).unwrap().due.is_assigned());
}

#[test]
fn accept_and_clear_follow_the_due_date_lifecycle() {
    let mut board = board_with_two_requests();

    let accepted = board.accept_suggestion(1).unwrap();
    assert_eq!(accepted, at(2023, 10, 18, 17));
    assert_eq!(
        due_of(&board, 1),
        DueDateState::Assigned {
            date: accepted,
            source: AssignmentSource::AcceptedSuggestion
        }
    );
    assert_eq!(board.accept_suggestion(1), Err(BoardError::NoSuggestion(1)));

    assert!(board.clear_due_date(1).unwrap());
    assert_eq!(due_of(&board, 1), DueDateState::Unscheduled);
    assert_eq!(board.accept_suggestion(1), Err(BoardError::NoSuggestion(1)));
    assert!(!board.clear_due_date(1).unwrap());

    board.recompute().unwrap();
    assert_eq!(due_of(&board, 1).suggestion(), Some(at(2023, 10, 18, 17)));
    assert_eq!(board.clear_due_date(42), Err(BoardError::TaskNotFound(42)));
}

#[test]
fn overlay_reports_latest_start_for_each_effective_due_date() {
    let mut board = board_with_two_requests();
    board
        .add_task(RequestTask::new(3, "Fatigue test", at(2023, 10, 16, 0), 4.0))
        .unwrap();
    board
        .assign_due_date(2, at(2023, 10, 20, 17), AssignmentSource::Manual)
        .unwrap();

    let overlay = board.schedule_overlay().unwrap();
    assert_eq!(overlay.len(), 3);
    assert_eq!(overlay[0].task_id, 1);
    assert_eq!(overlay[0].latest_start, Some(at(2023, 10, 13, 17)));
    assert_eq!(overlay[1].latest_start, Some(at(2023, 10, 19, 17)));
    assert_eq!(overlay[2].due, DueDateState::Unscheduled);
    assert_eq!(overlay[2].latest_start, None);
}

#[test]
fn task_collection_rules_are_enforced() {
    let mut board = board_with_two_requests();
    let duplicate = RequestTask::new(1, "Again", at(2023, 10, 13, 0), 1.0);
    assert_eq!(board.add_task(duplicate), Err(BoardError::DuplicateTask(1)));

    let negative = RequestTask::new(5, "Broken", at(2023, 10, 13, 0), -3.0);
    assert!(matches!(board.add_task(negative), Err(BoardError::InvalidTask(_))));

    let mut replacement = board.find_task(2).unwrap().clone();
    replacement.duration_hours = 12.0;
    board.upsert_task(replacement).unwrap();
    assert_eq!(board.tasks().len(), 2);
    assert_eq!(board.next_task_id(), 3);

    assert!(board.remove_task(2));
    assert!(!board.remove_task(2));

    let tasks = vec![
        RequestTask::new(1, "A", at(2023, 10, 13, 0), 1.0),
        RequestTask::new(1, "B", at(2023, 10, 13, 0), 1.0),
    ];
    assert!(DueDateBoard::with_tasks(CalendarPolicy::default(), tasks).is_err());
}

#[test]
fn unschedulable_task_is_rejected_and_board_stays_usable() {
    let mut board = DueDateBoard::new(CalendarPolicy::wall_clock());
    let huge = RequestTask::new(1, "Endless soak", at(2023, 10, 13, 0), 1e13);
    let err = board.add_task(huge).unwrap_err();
    assert!(matches!(err, BoardError::Scheduling { task_id: 1, .. }));
    assert!(board.tasks().is_empty());

    board
        .add_task(RequestTask::new(2, "Hardness test", at(2023, 10, 13, 9), 48.0))
        .unwrap();
    board.recompute().unwrap();
    board.set_policy(CalendarPolicy::default()).unwrap();
    assert_eq!(due_of(&board, 2).suggestion(), Some(at(2023, 10, 23, 17)));
}

#[test]
fn policy_that_strands_one_task_is_rejected_for_all() {
    let last = NaiveDate::MAX;
    let near_end = last.pred_opt().unwrap().pred_opt().unwrap();
    let seven_day = CalendarPolicy::new(false, 8, 17);

    let mut board = DueDateBoard::new(seven_day.clone());
    board
        .add_task(RequestTask::new(1, "Tensile test", at(2023, 10, 13, 0), 20.0))
        .unwrap();
    board
        .add_task(RequestTask::new(2, "Archive", near_end.and_hms_opt(0, 0, 0).unwrap(), 9.0))
        .unwrap();
    board.recompute().unwrap();
    let before = board.tasks().to_vec();

    // The last two calendar days become non-working; task 2 has nowhere to go.
    let stranding = seven_day
        .clone()
        .with_exceptional_days([last.pred_opt().unwrap(), last]);
    let err = board.set_policy(stranding).unwrap_err();
    assert!(matches!(err, BoardError::Scheduling { task_id: 2, .. }));
    assert_eq!(board.policy(), &seven_day);
    assert_eq!(board.tasks(), before.as_slice());
}

#[test]
fn clearing_is_refused_when_no_suggestion_could_follow() {
    let mut board = DueDateBoard::new(CalendarPolicy::wall_clock());
    let mut huge = RequestTask::new(1, "Endless soak", at(2023, 10, 13, 0), 1e13);
    huge.due = DueDateState::Assigned {
        date: at(2023, 12, 1, 17),
        source: AssignmentSource::Manual,
    };
    board.upsert_task(huge).unwrap();

    assert!(matches!(
        board.clear_due_date(1),
        Err(BoardError::Scheduling { task_id: 1, .. })
    ));
    assert!(due_of(&board, 1).is_assigned());
    board.recompute().unwrap();
}

#[test]
fn bulk_assign_counts_repeated_ids_once() {
    let mut board = board_with_two_requests();
    let count = board
        .bulk_assign(&[1, 1, 2, 1], at(2023, 10, 25, 17))
        .unwrap();
    assert_eq!(count, 2);
}

#[test]
fn stored_board_with_unschedulable_task_is_rejected() {
    let huge = RequestTask::new(1, "Endless soak", at(2023, 10, 13, 0), 1e13);
    let err = DueDateBoard::with_tasks(CalendarPolicy::wall_clock(), vec![huge]).unwrap_err();
    assert!(matches!(err, BoardError::Scheduling { task_id: 1, .. }));
}
