use bizdesk_core::db::open_db_in_memory;
use bizdesk_core::view::{
    board_view, calendar_view, events_between, gantt_view, table_view, GanttStatus,
};
use bizdesk_core::{
    ChecklistItem, Collaborator, LabelDefinition, NewTask, ProjectService, ProjectSnapshot,
    ProjectTask, SqliteProjectRepository, TaskList,
};
use std::collections::HashSet;
use time::macros::date;
use time::Date;
use uuid::Uuid;

fn list(project_id: Uuid, title: &str, order: i64, color: Option<&str>) -> TaskList {
    TaskList {
        id: Uuid::new_v4(),
        project_id,
        title: title.to_string(),
        order,
        color: color.map(str::to_string),
    }
}

fn task(list: &TaskList, title: &str, order: i64, due: Option<Date>) -> ProjectTask {
    let mut task = ProjectTask::new(list.id, title);
    task.order = order;
    task.due_date = due;
    task
}

/// Two lists stored out of order, a few tasks and one orphan.
fn sample_snapshot() -> ProjectSnapshot {
    let project_id = Uuid::new_v4();
    let done = list(project_id, "Done", 1, Some("#22c55e"));
    let todo = list(project_id, "Todo", 0, None);
    let ghost_list = list(project_id, "Deleted", 2, None);

    let mut write = task(&todo, "Write brief", 1, Some(date!(2024 - 05 - 10)));
    write.checklist = vec![
        ChecklistItem {
            text: "outline".to_string(),
            completed: true,
        },
        ChecklistItem::new("draft"),
        ChecklistItem::new("review"),
    ];
    let plan = task(&todo, "Plan", 0, Some(date!(2024 - 05 - 01)));
    let mut ship = task(&done, "Ship", 0, Some(date!(2024 - 05 - 20)));
    ship.completed = true;
    let someday = task(&todo, "Someday", 2, None);
    let orphan = task(&ghost_list, "Orphan", 0, None);

    ProjectSnapshot {
        lists: vec![done, todo],
        tasks: vec![ship, someday, write, orphan, plan],
        collaborators: Vec::new(),
        labels: Vec::new(),
    }
}

#[test]
fn board_partitions_every_task_exactly_once() {
    let snapshot = sample_snapshot();
    let board = board_view(&snapshot);

    let titles: Vec<&str> = board.columns.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, vec!["Todo", "Done"]);
    let todo: Vec<&str> = board.columns[0]
        .cards
        .iter()
        .map(|card| card.task.title.as_str())
        .collect();
    assert_eq!(todo, vec!["Plan", "Write brief", "Someday"]);
    assert_eq!(board.unassigned.len(), 1);
    assert_eq!(board.unassigned[0].task.title, "Orphan");

    assert_eq!(board.card_count(), snapshot.tasks.len());
    let seen: HashSet<Uuid> = board
        .columns
        .iter()
        .flat_map(|column| column.cards.iter())
        .chain(board.unassigned.iter())
        .map(|card| card.task.id)
        .collect();
    let expected: HashSet<Uuid> = snapshot.tasks.iter().map(|task| task.id).collect();
    assert_eq!(seen, expected);

    let brief = &board.columns[0].cards[1];
    assert_eq!(brief.checklist.completed, 1);
    assert_eq!(brief.checklist.total, 3);
    assert_eq!(brief.checklist.percent(), 33);
}

#[test]
fn table_degrades_on_missing_references() {
    let mut snapshot = sample_snapshot();
    let project_id = snapshot.lists[0].project_id;
    let alice = Collaborator {
        id: Uuid::new_v4(),
        project_id,
        display_name: "Alice Doe".to_string(),
        email: None,
    };
    let removed = Uuid::new_v4();
    snapshot.labels.push(LabelDefinition {
        project_id,
        name: "urgent".to_string(),
        color: "#ef4444".to_string(),
    });
    let plan = snapshot
        .tasks
        .iter_mut()
        .find(|task| task.title == "Plan")
        .unwrap();
    plan.assignees = vec![removed, alice.id];
    plan.labels = vec!["urgent".to_string(), "gone".to_string()];
    snapshot.collaborators.push(alice.clone());

    let rows = table_view(&snapshot);
    assert_eq!(rows.len(), snapshot.tasks.len());

    let order: Vec<&str> = rows.iter().map(|row| row.title.as_str()).collect();
    assert_eq!(order, vec!["Plan", "Write brief", "Someday", "Ship", "Orphan"]);

    let plan_row = &rows[0];
    assert_eq!(plan_row.list_title.as_deref(), Some("Todo"));
    assert_eq!(plan_row.assignees.len(), 1);
    assert_eq!(plan_row.assignees[0].id, alice.id);
    assert_eq!(plan_row.assignees[0].initials, "AD");
    assert!(plan_row.assignees.iter().all(|a| a.id != removed));
    assert_eq!(plan_row.unresolved_assignee_count, 1);
    assert_eq!(plan_row.labels[0].color.as_deref(), Some("#ef4444"));
    assert!(plan_row.labels[0].defined);
    assert_eq!(plan_row.labels[1].name, "gone");
    assert!(!plan_row.labels[1].defined);
    assert_eq!(plan_row.labels[1].color, None);

    let orphan_row = rows.last().unwrap();
    assert_eq!(orphan_row.list_title, None);
}

#[test]
fn calendar_only_contains_dated_tasks() {
    let snapshot = sample_snapshot();
    let events = calendar_view(&snapshot);

    let dated: Vec<(&str, Date)> = events
        .iter()
        .map(|event| (event.title.as_str(), event.date))
        .collect();
    assert_eq!(
        dated,
        vec![
            ("Plan", date!(2024 - 05 - 01)),
            ("Write brief", date!(2024 - 05 - 10)),
            ("Ship", date!(2024 - 05 - 20)),
        ]
    );
    assert!(events.iter().all(|event| event.title != "Someday"));
    assert_eq!(events[2].list_color.as_deref(), Some("#22c55e"));
    assert!(events[2].completed);

    let window = events_between(&events, date!(2024 - 05 - 10), date!(2024 - 05 - 20));
    assert_eq!(window.len(), 2);
}

#[test]
fn gantt_axis_is_padded_around_due_dates() {
    let project_id = Uuid::new_v4();
    let todo = list(project_id, "Todo", 0, None);
    let early = task(&todo, "early", 0, Some(date!(2024 - 05 - 01)));
    let late = task(&todo, "late", 1, Some(date!(2024 - 05 - 20)));
    let undated = task(&todo, "undated", 2, None);
    let ids = (early.id, late.id, undated.id);
    let snapshot = ProjectSnapshot {
        lists: vec![todo],
        tasks: vec![late, undated, early],
        ..ProjectSnapshot::default()
    };

    let view = gantt_view(&snapshot, date!(2024 - 05 - 10));
    assert_eq!(view.axis.start, date!(2024 - 04 - 26));
    assert_eq!(view.axis.end, date!(2024 - 05 - 25));
    assert_eq!(view.axis.total_days, 29);
    assert_eq!(view.unscheduled, vec![ids.2]);

    let first = &view.bars[0];
    let second = &view.bars[1];
    assert_eq!(first.task_id, ids.0);
    assert_eq!(second.task_id, ids.1);
    assert!(first.synthetic_start);
    assert_eq!(first.start, date!(2024 - 04 - 26));
    assert!(first.offset_percent < second.offset_percent);
    assert_eq!(first.offset_percent, 0.0);
    assert!((second.offset_percent - 19.0 / 29.0 * 100.0).abs() < 1e-9);
    assert!((first.width_percent - 5.0 / 29.0 * 100.0).abs() < 1e-9);

    assert_eq!(first.status, GanttStatus::Overdue);
    assert_eq!(second.status, GanttStatus::OnTrack);
}

#[test]
fn views_are_deterministic() {
    let snapshot = sample_snapshot();
    let today = date!(2024 - 05 - 05);

    assert_eq!(board_view(&snapshot), board_view(&snapshot));
    assert_eq!(table_view(&snapshot), table_view(&snapshot));
    assert_eq!(calendar_view(&snapshot), calendar_view(&snapshot));
    assert_eq!(gantt_view(&snapshot, today), gantt_view(&snapshot, today));

    let mut reversed = snapshot.clone();
    reversed.tasks.reverse();
    reversed.lists.reverse();
    assert_eq!(table_view(&snapshot), table_view(&reversed));
    assert_eq!(gantt_view(&snapshot, today), gantt_view(&reversed, today));
}

#[test]
fn service_views_read_from_store() {
    let conn = open_db_in_memory().unwrap();
    let service = ProjectService::new(SqliteProjectRepository::try_new(&conn).unwrap());
    let project = service.create_project("Launch").unwrap();
    let todo = service.create_list(project.id, "Todo", None).unwrap();
    let doing = service.create_list(project.id, "Doing", Some("#f97316")).unwrap();

    let mut input = NewTask::new(doing.id, "Print flyers");
    input.due_date = Some(date!(2024 - 05 - 10));
    service.create_task(project.id, input).unwrap();
    service
        .create_task(project.id, NewTask::new(todo.id, "Book venue"))
        .unwrap();

    let board = service.board(project.id).unwrap();
    assert_eq!(board.columns.len(), 2);
    assert_eq!(board.columns[0].title, "Todo");
    assert!(board.unassigned.is_empty());

    let events = service.calendar(project.id).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].date, date!(2024 - 05 - 10));
    assert_eq!(events[0].list_color.as_deref(), Some("#f97316"));

    assert_eq!(service.table(project.id).unwrap().len(), 2);
    let gantt = service.gantt(project.id, date!(2024 - 05 - 01)).unwrap();
    assert_eq!(gantt.bars.len(), 1);
    assert_eq!(gantt.unscheduled.len(), 1);
}
