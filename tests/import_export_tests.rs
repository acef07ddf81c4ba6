use chrono::{NaiveDate, NaiveDateTime};
use due_date_scheduler::{
    AssignmentSource, CalendarPolicy, DueDateBoard, DueDateState, PersistenceError, RequestTask,
    load_board_from_csv, load_board_from_json, load_policy_from_json, save_board_to_csv,
    save_board_to_json, save_policy_to_json,
};
use std::io::Write;
use tempfile::NamedTempFile;

fn d(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn at(y: i32, m: u32, day: u32, h: u32) -> NaiveDateTime {
    d(y, m, day).and_hms_opt(h, 0, 0).unwrap()
}

fn sample_board() -> DueDateBoard {
    let policy = CalendarPolicy::new(true, 9, 18).with_exceptional_days([d(2023, 10, 16)]);
    let mut board = DueDateBoard::new(policy);

    let mut tensile = RequestTask::new(1, "Tensile test", at(2023, 10, 13, 9), 20.0)
        .with_request_no("TR-001");
    tensile.notes = Some("Bring fixtures, batch 7".into());
    board.add_task(tensile).unwrap();
    board
        .add_task(RequestTask::new(2, "Hardness test", at(2023, 10, 16, 0), 7.5))
        .unwrap();
    board
        .add_task(RequestTask::new(3, "Salt spray", at(2023, 10, 17, 0), 48.0))
        .unwrap();
    board.recompute().unwrap();
    board
        .assign_due_date(2, at(2023, 10, 20, 12), AssignmentSource::CalendarDrop)
        .unwrap();
    board.clear_due_date(3).unwrap();
    board
}

#[test]
fn json_snapshot_round_trips_policy_and_due_states() {
    let board = sample_board();
    let file = NamedTempFile::new().unwrap();
    save_board_to_json(&board, file.path()).unwrap();

    let loaded = load_board_from_json(file.path()).unwrap();
    assert_eq!(loaded.policy(), board.policy());
    assert_eq!(loaded.tasks(), board.tasks());
    assert_eq!(
        loaded.find_task(1).unwrap().due,
        DueDateState::Suggested {
            date: at(2023, 10, 19, 18)
        }
    );
}

#[test]
fn csv_export_round_trips_tasks() {
    let board = sample_board();
    let file = NamedTempFile::new().unwrap();
    save_board_to_csv(&board, file.path()).unwrap();

    let loaded = load_board_from_csv(file.path(), board.policy().clone()).unwrap();
    assert_eq!(loaded.tasks(), board.tasks());

    let contents = std::fs::read_to_string(file.path()).unwrap();
    let header = contents.lines().next().unwrap();
    assert_eq!(
        header,
        "id,request_no,name,request_date,duration_hours,due_state,due_date,due_source,notes"
    );
    assert!(contents.contains("2023-10-20T12:00:00"));
    assert!(contents.contains("calendar_drop"));
}

#[test]
fn csv_with_assigned_state_but_no_date_is_rejected() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        "id,request_no,name,request_date,duration_hours,due_state,due_date,due_source,notes"
    )
    .unwrap();
    writeln!(file, "1,TR-9,Impact test,2023-10-13T00:00:00,4,assigned,,manual,").unwrap();
    file.flush().unwrap();

    let err = load_board_from_csv(file.path(), CalendarPolicy::default()).unwrap_err();
    match err {
        PersistenceError::InvalidData(message) => assert!(message.contains("no due_date")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn empty_csv_is_rejected() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        "id,request_no,name,request_date,duration_hours,due_state,due_date,due_source,notes"
    )
    .unwrap();
    file.flush().unwrap();
    assert!(matches!(
        load_board_from_csv(file.path(), CalendarPolicy::default()),
        Err(PersistenceError::InvalidData(_))
    ));
}

#[test]
fn policy_file_round_trip_and_validation() {
    let policy = CalendarPolicy::new(false, 7, 15).with_exceptional_days([d(2023, 12, 25)]);
    let file = NamedTempFile::new().unwrap();
    save_policy_to_json(&policy, file.path()).unwrap();
    assert_eq!(load_policy_from_json(file.path()).unwrap(), policy);

    let mut broken = NamedTempFile::new().unwrap();
    write!(
        broken,
        r#"{{"skipWeekends": true, "workingHoursStart": 18, "workingHoursEnd": 9}}"#
    )
    .unwrap();
    broken.flush().unwrap();
    let err = load_policy_from_json(broken.path()).unwrap_err();
    assert!(err.to_string().contains("must be after working hours start"));

    let invalid = CalendarPolicy::new(true, 12, 12);
    assert!(save_policy_to_json(&invalid, file.path()).is_err());
}

#[test]
fn json_with_duplicate_ids_is_rejected() {
    let mut file = NamedTempFile::new().unwrap();
    let task = serde_json::json!({
        "id": 1,
        "name": "Dup",
        "requestDate": "2023-10-13T00:00:00",
        "durationHours": 2.0
    });
    let snapshot = serde_json::json!({ "tasks": [task.clone(), task] });
    write!(file, "{}", snapshot).unwrap();
    file.flush().unwrap();

    let err = load_board_from_json(file.path()).unwrap_err();
    assert!(err.to_string().contains("duplicate task id 1"));
}
