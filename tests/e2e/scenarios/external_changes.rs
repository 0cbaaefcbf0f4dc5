use crate::harness::{Assertion, Scenario};
use chrono::Duration;

#[test]
fn test_external_deletion_removes_single_row() {
    Scenario::new("external_deletion")
        .session_adds("T1", "one")
        .session_adds("T2", "two")
        .session_adds("T3", "three")
        .assert_notified(&[
            "section inserted",
            "inserted T1 @0",
            "inserted T2 @0",
            "inserted T3 @0",
        ])
        .external_deletes("T2")
        .session_refreshes()
        .assert_notified(&["deleted T2 @1"])
        .assert_order(&["T3", "T1"])
        .assert_store_matches()
        .run()
        .expect("scenario should pass");
}

#[test]
fn test_external_write_appears_in_order() {
    Scenario::new("external_write")
        .session_adds("T1", "mine")
        .external_writes("T2", "theirs")
        .session_adds("T3", "mine again")
        .assert_notified(&["section inserted", "inserted T1 @0", "inserted T3 @0"])
        .session_refreshes()
        .assert_notified(&["inserted T2 @1"])
        .assert_order(&["T3", "T2", "T1"])
        .assert_store_matches()
        .run()
        .unwrap();
}

#[test]
fn test_refresh_without_changes_is_silent() {
    Scenario::new("quiet_refresh")
        .session_adds("T1", "one")
        .assert_notified(&["section inserted", "inserted T1 @0"])
        .session_refreshes()
        .session_refreshes()
        .assert_not_notified()
        .run()
        .unwrap();
}

#[test]
fn test_partial_file_waits_until_complete() {
    Scenario::new("partial_file")
        .external_starts_writing("T1", "slow writer")
        .session_refreshes()
        .assert_count(0)
        .assert_not_notified()
        .external_finishes_writing("T1")
        .session_refreshes()
        .assert_notified(&["section inserted", "inserted T1 @0"])
        .assert(Assertion::ContentIs {
            label: "T1".into(),
            content: "slow writer".into(),
        })
        .run()
        .unwrap();
}

#[test]
fn test_external_retime_moves_row() {
    Scenario::new("external_retime")
        .session_adds("T1", "one")
        .session_adds("T2", "two")
        .assert_notified(&["section inserted", "inserted T1 @0", "inserted T2 @0"])
        .external_retimes("T1", Duration::hours(1))
        .session_refreshes()
        .assert_notified(&["moved T1 @1->0"])
        .assert_order(&["T1", "T2"])
        .assert_store_matches()
        .run()
        .unwrap();
}

#[test]
fn test_stray_files_are_ignored() {
    Scenario::new("stray_files")
        .session_adds("T1", "one")
        .external_stray_file("notes.md")
        .external_stray_file(".hidden.txt")
        .session_refreshes()
        .assert_count(1)
        .assert_store_matches()
        .assert(Assertion::FileExists("notes.md".into()))
        .run()
        .unwrap();
}

#[test]
fn test_external_deletion_drops_pending_edit() {
    Scenario::new("deleted_while_editing")
        .session_adds("T1", "draft")
        .session_edits("T1", "never saved")
        .external_deletes("T1")
        .session_refreshes()
        .assert(Assertion::HasChanges(false))
        .assert(Assertion::Absent("T1".into()))
        .session_saves()
        .assert(Assertion::RecordFileCount(0))
        .run()
        .unwrap();
}

#[test]
fn test_empty_clears_directory() {
    Scenario::new("empty_directory")
        .session_adds("T1", "one")
        .session_adds("T2", "two")
        .external_stray_file("notes.md")
        .empty()
        .session_refreshes()
        .assert_count(0)
        .assert(Assertion::RecordFileCount(0))
        .assert(Assertion::FileExists("notes.md".into()))
        .assert_store_matches()
        .run()
        .unwrap();
}
