mod common;

use common::{day, Fixture};
use sprintboard_core::{
    DateRangeReason, Iteration, IterationChange, IterationService, NewIteration, ScheduleError,
    ServiceError, WorkItem, WorkItemService, WrongDateRange,
};

fn create_project(fx: &Fixture) -> WorkItem {
    let items = WorkItemService::new(&fx.conn);
    let project = items.create_project(&fx.admin, "Roadmap", None).unwrap();
    items
        .add_participant(&fx.admin, project.id, fx.member.user_id)
        .unwrap();
    project
}

fn sprint(project: &WorkItem, name: &str, start: &str, end: &str) -> NewIteration {
    NewIteration {
        project_id: project.id,
        name: name.to_string(),
        start_date: day(start),
        end_date: day(end),
    }
}

fn create(fx: &Fixture, request: &NewIteration) -> Iteration {
    IterationService::new(&fx.conn)
        .create_iteration(&fx.member, request)
        .unwrap()
}

fn expect_wrong_range(err: ServiceError) -> WrongDateRange {
    match err {
        ServiceError::Schedule(ScheduleError::WrongDateRange(range)) => range,
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn create_iteration_persists_and_lists_by_start_date() {
    let fx = Fixture::new();
    let project = create_project(&fx);
    let service = IterationService::new(&fx.conn);

    let later = create(&fx, &sprint(&project, "Sprint 2", "2024-01-11", "2024-01-20"));
    let earlier = create(&fx, &sprint(&project, "  Sprint 1 ", "2024-01-01", "2024-01-10"));
    assert_eq!(earlier.name, "Sprint 1");

    let listed = service.list_iterations(&fx.member, project.id).unwrap();
    let ids: Vec<_> = listed.iter().map(|iteration| iteration.id).collect();
    assert_eq!(ids, vec![earlier.id, later.id]);

    let loaded = service.get_iteration(&fx.member, later.id).unwrap();
    assert_eq!(loaded.start_date, day("2024-01-11"));
    assert_eq!(loaded.end_date, day("2024-01-20"));
}

#[test]
fn equal_start_and_end_is_rejected() {
    let fx = Fixture::new();
    let project = create_project(&fx);

    let err = IterationService::new(&fx.conn)
        .create_iteration(
            &fx.member,
            &sprint(&project, "Day", "2024-01-05", "2024-01-05"),
        )
        .unwrap_err();

    let range = expect_wrong_range(err);
    assert_eq!(range.reason, DateRangeReason::EndBeforeStart);
    assert_eq!(range.conflicting_id, None);
}

#[test]
fn shared_boundary_day_is_an_overlap() {
    let fx = Fixture::new();
    let project = create_project(&fx);
    let first = create(&fx, &sprint(&project, "Sprint 1", "2024-01-01", "2024-01-10"));

    let err = IterationService::new(&fx.conn)
        .create_iteration(
            &fx.member,
            &sprint(&project, "Sprint 2", "2024-01-10", "2024-01-20"),
        )
        .unwrap_err();

    let range = expect_wrong_range(err);
    assert_eq!(range.reason, DateRangeReason::Overlap);
    assert_eq!(range.conflicting_id, Some(first.id));

    let listed = IterationService::new(&fx.conn)
        .list_iterations(&fx.member, project.id)
        .unwrap();
    assert_eq!(listed.len(), 1);
}

#[test]
fn adjacent_iterations_are_accepted() {
    let fx = Fixture::new();
    let project = create_project(&fx);
    create(&fx, &sprint(&project, "Sprint 1", "2024-01-01", "2024-01-10"));
    create(&fx, &sprint(&project, "Sprint 2", "2024-01-11", "2024-01-20"));

    let service = IterationService::new(&fx.conn);
    let found = service
        .iteration_on(&fx.member, project.id, day("2024-01-11"))
        .unwrap()
        .unwrap();
    assert_eq!(found.name, "Sprint 2");
    assert!(service
        .iteration_on(&fx.member, project.id, day("2024-02-01"))
        .unwrap()
        .is_none());
}

#[test]
fn other_projects_do_not_conflict() {
    let fx = Fixture::new();
    let first = create_project(&fx);
    let second = create_project(&fx);
    create(&fx, &sprint(&first, "A", "2024-01-01", "2024-01-10"));
    create(&fx, &sprint(&second, "B", "2024-01-01", "2024-01-10"));
}

#[test]
fn rescheduling_excludes_the_iteration_itself() {
    let fx = Fixture::new();
    let project = create_project(&fx);
    let first = create(&fx, &sprint(&project, "Sprint 1", "2024-01-01", "2024-01-10"));
    let second = create(&fx, &sprint(&project, "Sprint 2", "2024-01-11", "2024-01-20"));
    let service = IterationService::new(&fx.conn);

    let moved = service
        .update_iteration(
            &fx.member,
            first.id,
            &[
                IterationChange::Rename("Kickoff".to_string()),
                IterationChange::Reschedule {
                    start_date: day("2024-01-02"),
                    end_date: day("2024-01-09"),
                },
            ],
        )
        .unwrap();
    assert_eq!(moved.name, "Kickoff");
    assert_eq!(moved.start_date, day("2024-01-02"));

    let err = service
        .update_iteration(
            &fx.member,
            first.id,
            &[IterationChange::Reschedule {
                start_date: day("2024-01-02"),
                end_date: day("2024-01-11"),
            }],
        )
        .unwrap_err();
    assert_eq!(expect_wrong_range(err).conflicting_id, Some(second.id));

    let stored = service.get_iteration(&fx.member, first.id).unwrap();
    assert_eq!(stored.end_date, day("2024-01-09"));
}

#[test]
fn non_participant_cannot_create_iterations() {
    let fx = Fixture::new();
    let project = create_project(&fx);

    let err = IterationService::new(&fx.conn)
        .create_iteration(
            &fx.outsider,
            &sprint(&project, "Sprint 1", "2024-01-01", "2024-01-10"),
        )
        .unwrap_err();
    assert!(matches!(err, ServiceError::AccessDenied { .. }));
}

#[test]
fn iterations_belong_to_projects_only() {
    let fx = Fixture::new();
    let project = create_project(&fx);
    let task = WorkItemService::new(&fx.conn)
        .create_task(&fx.member, project.id, "Write docs")
        .unwrap();

    let err = IterationService::new(&fx.conn)
        .create_iteration(
            &fx.member,
            &sprint(&task, "Sprint 1", "2024-01-01", "2024-01-10"),
        )
        .unwrap_err();
    assert!(matches!(err, ServiceError::WrongKind { id, .. } if id == task.id));
}

#[test]
fn scheduled_items_are_released_when_iteration_is_deleted() {
    let fx = Fixture::new();
    let project = create_project(&fx);
    let items = WorkItemService::new(&fx.conn);
    let service = IterationService::new(&fx.conn);
    let iteration = create(&fx, &sprint(&project, "Sprint 1", "2024-01-01", "2024-01-10"));
    let task = items.create_task(&fx.member, project.id, "Ship it").unwrap();

    let scheduled = service
        .schedule_item(&fx.member, iteration.id, task.id)
        .unwrap();
    assert_eq!(scheduled.iteration_id, Some(iteration.id));
    let listed = service
        .list_iteration_items(&fx.member, iteration.id)
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, task.id);

    service.delete_iteration(&fx.member, iteration.id).unwrap();

    let reloaded = items.get_item(&fx.member, task.id).unwrap();
    assert_eq!(reloaded.iteration_id, None);
    let err = service.get_iteration(&fx.member, iteration.id).unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { entity: "iteration", .. }));
}

#[test]
fn unschedule_clears_the_iteration() {
    let fx = Fixture::new();
    let project = create_project(&fx);
    let service = IterationService::new(&fx.conn);
    let iteration = create(&fx, &sprint(&project, "Sprint 1", "2024-01-01", "2024-01-10"));
    let task = WorkItemService::new(&fx.conn)
        .create_task(&fx.member, project.id, "Ship it")
        .unwrap();
    service
        .schedule_item(&fx.member, iteration.id, task.id)
        .unwrap();

    let released = service.unschedule_item(&fx.member, task.id).unwrap();
    assert_eq!(released.iteration_id, None);
    assert!(service
        .list_iteration_items(&fx.member, iteration.id)
        .unwrap()
        .is_empty());
}

#[test]
fn items_of_other_projects_cannot_be_scheduled() {
    let fx = Fixture::new();
    let project = create_project(&fx);
    let other = create_project(&fx);
    let service = IterationService::new(&fx.conn);
    let iteration = create(&fx, &sprint(&project, "Sprint 1", "2024-01-01", "2024-01-10"));
    let foreign_task = WorkItemService::new(&fx.conn)
        .create_task(&fx.member, other.id, "Elsewhere")
        .unwrap();

    let err = service
        .schedule_item(&fx.member, iteration.id, foreign_task.id)
        .unwrap_err();
    assert!(matches!(err, ServiceError::IterationProjectMismatch { .. }));

    let err = service
        .schedule_item(&fx.member, iteration.id, project.id)
        .unwrap_err();
    assert!(matches!(err, ServiceError::IterationProjectMismatch { .. }));
}
