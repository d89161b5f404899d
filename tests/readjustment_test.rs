// ==========================================
// 重排建议引擎集成测试
// ==========================================
// 测试范围:
// 1. 检查: 机台冲突检测、无冲突程序
// 2. 应用: 任务平移、逐条结果上报 (部分失败)
// ==========================================


use test_helpers::{date, TestEnv};
use workshop_mes::domain::adjustment::AdjustmentSuggestion;
use workshop_mes::domain::types::TaskState;

#[tokio::test]
async fn test_check_同机台竞争产生建议() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let program = env.seed_program("冲突程序", date(2024, 6, 3));

    // 两个工单抢同一机台 M1: 高优先级占满周一 (90件 / 10件每小时 = 9小时)
    let o1 = env.seed_order(&program.program_id, "OT-A", 90.0, Some(1.0));
    env.seed_route_item(&o1.order_id, 1, "CORTE", "M1", 10.0, 90.0);

    let o2 = env.seed_order(&program.program_id, "OT-B", 40.0, Some(1.0));
    env.seed_route_item(&o2.order_id, 1, "CORTE", "M1", 10.0, 40.0);

    let report = env
        .state
        .program_api
        .check_readjustments(&program.program_id)
        .await
        .expect("重排检查失败");

    assert!(report.requires_adjustment);
    assert_eq!(report.suggestions.len(), 1);

    let s = &report.suggestions[0];
    assert_eq!(s.order_code, "OT-B");
    assert_eq!(s.machine_code, "M1");
    // 低优先级工单被平移到机台释放之后
    assert!(s.proposed_start > s.original_start);
    assert!(report.proposed_end_date.is_some());
}

#[tokio::test]
async fn test_check_不同机台无建议() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let program = env.seed_program("无冲突程序", date(2024, 6, 3));

    let o1 = env.seed_order(&program.program_id, "OT-A", 90.0, Some(1.0));
    env.seed_route_item(&o1.order_id, 1, "CORTE", "M1", 10.0, 90.0);

    let o2 = env.seed_order(&program.program_id, "OT-B", 40.0, Some(1.0));
    env.seed_route_item(&o2.order_id, 1, "TORNO", "M2", 10.0, 40.0);

    let report = env
        .state
        .program_api
        .check_readjustments(&program.program_id)
        .await
        .expect("重排检查失败");

    assert!(!report.requires_adjustment);
    assert!(report.suggestions.is_empty());
}

#[tokio::test]
async fn test_apply_平移待生产片段() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let program = env.seed_program("平移程序", date(2024, 6, 3));
    let order = env.seed_order(&program.program_id, "OT-C", 40.0, Some(1.0));
    let item = env.seed_route_item(&order.order_id, 1, "CORTE", "M1", 10.0, 40.0);

    let task = env.seed_task(
        &program.program_id,
        &item.route_item_id,
        date(2024, 6, 3),
        1,
        40.0,
        0.0,
        None,
        TaskState::Pending,
    );

    let suggestion = AdjustmentSuggestion {
        order_code: "OT-C".to_string(),
        route_item_id: item.route_item_id.clone(),
        process_code: "CORTE".to_string(),
        process_description: "工序 CORTE".to_string(),
        machine_id: "M1".to_string(),
        machine_code: "M1".to_string(),
        original_start: date(2024, 6, 3).and_hms_opt(7, 45, 0).unwrap(),
        proposed_start: date(2024, 6, 4).and_hms_opt(7, 45, 0).unwrap(),
    };

    let result = env
        .state
        .program_api
        .apply_readjustments(&program.program_id, &[suggestion], TestEnv::now())
        .await
        .expect("应用失败");

    assert_eq!(result.applied_count, 1);
    assert_eq!(result.failed_count, 0);

    let moved = env
        .task_repo
        .find_by_id(&task.task_id)
        .expect("查询失败")
        .expect("任务不存在");
    assert_eq!(moved.date, date(2024, 6, 4));

    // 程序结束日期随平移刷新
    let refreshed = env
        .state
        .program_api
        .get_program(&program.program_id)
        .expect("查询失败");
    assert_eq!(refreshed.end_date, Some(date(2024, 6, 4)));
}

#[tokio::test]
async fn test_apply_周末落点顺延到工作日() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let program = env.seed_program("周末顺延", date(2024, 6, 6));
    let order = env.seed_order(&program.program_id, "OT-D", 40.0, Some(1.0));
    let item = env.seed_route_item(&order.order_id, 1, "CORTE", "M1", 10.0, 40.0);

    let task = env.seed_task(
        &program.program_id,
        &item.route_item_id,
        date(2024, 6, 6), // 周四
        1,
        40.0,
        0.0,
        None,
        TaskState::Pending,
    );

    // 平移两天: 周四 → 周六, 必须顺延到下周一
    let suggestion = AdjustmentSuggestion {
        order_code: "OT-D".to_string(),
        route_item_id: item.route_item_id.clone(),
        process_code: "CORTE".to_string(),
        process_description: "工序 CORTE".to_string(),
        machine_id: "M1".to_string(),
        machine_code: "M1".to_string(),
        original_start: date(2024, 6, 6).and_hms_opt(7, 45, 0).unwrap(),
        proposed_start: date(2024, 6, 8).and_hms_opt(7, 45, 0).unwrap(),
    };

    env.state
        .program_api
        .apply_readjustments(&program.program_id, &[suggestion], TestEnv::now())
        .await
        .expect("应用失败");

    let moved = env
        .task_repo
        .find_by_id(&task.task_id)
        .expect("查询失败")
        .expect("任务不存在");
    assert_eq!(moved.date, date(2024, 6, 10));
}

#[tokio::test]
async fn test_apply_部分失败逐条上报() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let program = env.seed_program("部分失败程序", date(2024, 6, 3));
    let order = env.seed_order(&program.program_id, "OT-E", 40.0, Some(1.0));
    let item = env.seed_route_item(&order.order_id, 1, "CORTE", "M1", 10.0, 40.0);

    env.seed_task(
        &program.program_id,
        &item.route_item_id,
        date(2024, 6, 3),
        1,
        40.0,
        0.0,
        None,
        TaskState::Pending,
    );

    let good = AdjustmentSuggestion {
        order_code: "OT-E".to_string(),
        route_item_id: item.route_item_id.clone(),
        process_code: "CORTE".to_string(),
        process_description: "工序 CORTE".to_string(),
        machine_id: "M1".to_string(),
        machine_code: "M1".to_string(),
        original_start: date(2024, 6, 3).and_hms_opt(7, 45, 0).unwrap(),
        proposed_start: date(2024, 6, 4).and_hms_opt(7, 45, 0).unwrap(),
    };

    // 引用不存在的工艺路线项: 单条失败, 不拖垮整批
    let bad = AdjustmentSuggestion {
        route_item_id: "no-such-route-item".to_string(),
        ..good.clone()
    };

    let result = env
        .state
        .program_api
        .apply_readjustments(&program.program_id, &[good, bad], TestEnv::now())
        .await
        .expect("应用失败");

    assert_eq!(result.applied_count, 1);
    assert_eq!(result.failed_count, 1);
    assert!(result.is_partial_failure());

    assert!(result.outcomes[0].applied);
    assert!(!result.outcomes[1].applied);
    assert!(result.outcomes[1].error.is_some(), "失败项必须携带原因");
}
