// ==========================================
// 日结流程集成测试
// ==========================================
// 测试范围:
// 1. 预览: 无副作用、幂等
// 2. 日结: 延续创建、数量守恒、谱系可查
// 3. 终态: 重复日结拒绝、并发日结串行化
// 4. 边界: 全部完成的日子零延续但仍标记日结
// ==========================================


use test_helpers::{date, TestEnv};
use workshop_mes::api::ApiError;
use workshop_mes::domain::types::{DayReportState, TaskState};

/// 周一 100kg 任务完成 40kg 的监督场景
fn seed_monday_task(env: &TestEnv) -> (String, String) {
    let program = env.seed_program("六月第一周排产", date(2024, 6, 3));
    let order = env.seed_order(&program.program_id, "OT-1001", 100.0, Some(1.0));
    let item = env.seed_route_item(&order.order_id, 1, "CORTE", "M1", 10.0, 100.0);

    let task = env.seed_task(
        &program.program_id,
        &item.route_item_id,
        date(2024, 6, 3),
        1,
        100.0,
        40.0,
        Some(40.0),
        TaskState::InProgress,
    );

    (program.program_id, task.task_id)
}

#[tokio::test]
async fn test_preview_计算结转且无副作用() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let (program_id, task_id) = seed_monday_task(&env);

    let preview = env
        .state
        .program_api
        .preview_finalize_day(&program_id, date(2024, 6, 3))
        .await
        .expect("预览失败");

    // 周一的下一工作日是周二
    assert_eq!(preview.next_working_day, date(2024, 6, 4));
    assert_eq!(preview.pending_tasks.len(), 1);

    let pending = &preview.pending_tasks[0];
    assert_eq!(pending.task_id, task_id);
    assert_eq!(pending.quantity_pending, 60.0);
    assert_eq!(pending.percent_complete, 40.0);
    assert_eq!(pending.plan.carried_quantity, 60.0);
    assert_eq!(pending.plan.carried_weight_kg, 60.0);
    assert_eq!(pending.order_code, "OT-1001");

    // 预览不落库: 无新任务、无日结记录
    let tasks = env
        .task_repo
        .list_for_day(&program_id, date(2024, 6, 4))
        .expect("查询失败");
    assert!(tasks.is_empty(), "预览不应创建任务");

    let report = env
        .day_report_repo
        .find(&program_id, date(2024, 6, 3))
        .expect("查询失败");
    assert!(report.is_none(), "预览不应写入日结记录");
}

#[tokio::test]
async fn test_preview_无编辑时幂等() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let (program_id, _) = seed_monday_task(&env);

    let first = env
        .state
        .program_api
        .preview_finalize_day(&program_id, date(2024, 6, 3))
        .await
        .expect("第一次预览失败");
    let second = env
        .state
        .program_api
        .preview_finalize_day(&program_id, date(2024, 6, 3))
        .await
        .expect("第二次预览失败");

    assert_eq!(first, second, "两次预览结果应完全一致");
}

#[tokio::test]
async fn test_finalize_创建延续并可查谱系() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let (program_id, task_id) = seed_monday_task(&env);

    let result = env
        .state
        .program_api
        .finalize_day(&program_id, date(2024, 6, 3), "supervisor", TestEnv::now())
        .await
        .expect("日结失败");

    assert_eq!(result.total_created, 1);
    assert_eq!(result.next_working_day, date(2024, 6, 4));
    assert_eq!(result.created[0].parent_task_id, task_id);
    assert_eq!(result.created[0].carried_quantity, 60.0);

    // 父任务转入 CONTINUED
    let parent = env
        .task_repo
        .find_by_id(&task_id)
        .expect("查询失败")
        .expect("父任务不存在");
    assert_eq!(parent.state, TaskState::Continued);

    // 子任务: 周二, 60kg, PENDING, 无操作工
    let child = env
        .task_repo
        .find_by_id(&result.created[0].child_task_id)
        .expect("查询失败")
        .expect("子任务不存在");
    assert_eq!(child.date, date(2024, 6, 4));
    assert_eq!(child.quantity_programmed, 60.0);
    assert_eq!(child.quantity_completed, 0.0);
    assert_eq!(child.weight_programmed_kg, 60.0);
    assert_eq!(child.state, TaskState::Pending);
    assert!(child.is_continuation);
    assert_eq!(child.fragment_level, 1);
    assert!(child.operator_id.is_none());

    // 数量守恒: 结转 + 完成 == 计划
    assert_eq!(
        child.quantity_programmed + parent.quantity_completed,
        parent.quantity_programmed
    );

    // 日结记录为终态
    let report = env
        .day_report_repo
        .find(&program_id, date(2024, 6, 3))
        .expect("查询失败")
        .expect("日结记录不存在");
    assert_eq!(report.state, DayReportState::Finalized);
    assert_eq!(report.closed_by.as_deref(), Some("supervisor"));

    // 谱系: 根 40/100 (40%), 一个子片段 0/60, 全局进度 40%
    let tree = env
        .state
        .task_api
        .get_genealogy(&task_id)
        .expect("谱系查询失败");
    assert_eq!(tree.root_task_id, task_id);
    assert_eq!(tree.total_quantity, 100.0);
    assert!((tree.global_progress - 40.0).abs() < 1e-6);
    assert_eq!(tree.root.percent_complete, 40.0);
    assert_eq!(tree.root.children.len(), 1);

    let child_node = &tree.root.children[0];
    assert!(child_node.is_continuation);
    assert_eq!(child_node.quantity_assigned, 60.0);
    assert_eq!(child_node.percent_complete, 0.0);
}

#[tokio::test]
async fn test_finalize_重复日结被拒绝() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let (program_id, _) = seed_monday_task(&env);

    env.state
        .program_api
        .finalize_day(&program_id, date(2024, 6, 3), "supervisor", TestEnv::now())
        .await
        .expect("第一次日结失败");

    let before = env
        .task_repo
        .list_for_program(&program_id)
        .expect("查询失败")
        .len();

    let second = env
        .state
        .program_api
        .finalize_day(&program_id, date(2024, 6, 3), "supervisor", TestEnv::now())
        .await;

    match second {
        Err(ApiError::AlreadyFinalized { .. }) => {}
        other => panic!(
            "第二次日结应返回 AlreadyFinalized, 实际: {:?}",
            other.map(|r| r.total_created)
        ),
    }

    // 不产生新行: 每个未完成任务恰好一个延续
    let after = env
        .task_repo
        .list_for_program(&program_id)
        .expect("查询失败")
        .len();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_finalize_并发串行化仅一次成功() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let (program_id, _) = seed_monday_task(&env);

    let api_a = env.state.program_api.clone();
    let api_b = env.state.program_api.clone();
    let (pid_a, pid_b) = (program_id.clone(), program_id.clone());

    let handle_a = tokio::spawn(async move {
        api_a
            .finalize_day(&pid_a, date(2024, 6, 3), "supervisor-a", TestEnv::now())
            .await
    });
    let handle_b = tokio::spawn(async move {
        api_b
            .finalize_day(&pid_b, date(2024, 6, 3), "supervisor-b", TestEnv::now())
            .await
    });

    let results = [
        handle_a.await.expect("任务a崩溃"),
        handle_b.await.expect("任务b崩溃"),
    ];

    let ok_count = results.iter().filter(|r| r.is_ok()).count();
    let already = results
        .iter()
        .filter(|r| matches!(r, Err(ApiError::AlreadyFinalized { .. })))
        .count();

    assert_eq!(ok_count, 1, "并发日结应恰好一次成功");
    assert_eq!(already, 1, "落败方应观察到 AlreadyFinalized");

    // 恰好一个延续片段
    let continuations = env
        .task_repo
        .list_for_day(&program_id, date(2024, 6, 4))
        .expect("查询失败");
    assert_eq!(continuations.len(), 1);
}

#[tokio::test]
async fn test_finalize_全部完成零延续仍标记日结() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let program = env.seed_program("全部完成的日子", date(2024, 6, 3));
    let order = env.seed_order(&program.program_id, "OT-2001", 50.0, Some(1.0));
    let item = env.seed_route_item(&order.order_id, 1, "TORNO", "M2", 10.0, 50.0);

    env.seed_task(
        &program.program_id,
        &item.route_item_id,
        date(2024, 6, 3),
        1,
        50.0,
        50.0,
        Some(50.0),
        TaskState::Completed,
    );

    // 预览: 空延续列表
    let preview = env
        .state
        .program_api
        .preview_finalize_day(&program.program_id, date(2024, 6, 3))
        .await
        .expect("预览失败");
    assert!(preview.pending_tasks.is_empty());

    // 日结: 零延续但日子进入终态
    let result = env
        .state
        .program_api
        .finalize_day(
            &program.program_id,
            date(2024, 6, 3),
            "supervisor",
            TestEnv::now(),
        )
        .await
        .expect("日结失败");
    assert_eq!(result.total_created, 0);

    assert!(env
        .day_report_repo
        .is_finalized(&program.program_id, date(2024, 6, 3))
        .expect("查询失败"));
}

#[tokio::test]
async fn test_finalize_周五延续到下周一() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let program = env.seed_program("跨周末延续", date(2024, 6, 7));
    let order = env.seed_order(&program.program_id, "OT-3001", 80.0, Some(1.0));
    let item = env.seed_route_item(&order.order_id, 1, "FRESA", "M3", 10.0, 80.0);

    env.seed_task(
        &program.program_id,
        &item.route_item_id,
        date(2024, 6, 7), // 周五
        1,
        80.0,
        30.0,
        Some(30.0),
        TaskState::InProgress,
    );

    let result = env
        .state
        .program_api
        .finalize_day(
            &program.program_id,
            date(2024, 6, 7),
            "supervisor",
            TestEnv::now(),
        )
        .await
        .expect("日结失败");

    // 周末被跳过, 延续片段落在下周一
    assert_eq!(result.next_working_day, date(2024, 6, 10));

    let child = env
        .task_repo
        .find_by_id(&result.created[0].child_task_id)
        .expect("查询失败")
        .expect("子任务不存在");
    assert_eq!(child.date, date(2024, 6, 10));
}

#[tokio::test]
async fn test_preview_未知程序返回NotFound() {
    let env = TestEnv::new().expect("无法创建测试环境");

    let result = env
        .state
        .program_api
        .preview_finalize_day("no-such-program", date(2024, 6, 3))
        .await;

    assert!(matches!(result, Err(ApiError::NotFound(_))));
}
