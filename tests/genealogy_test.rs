// ==========================================
// 谱系索引集成测试
// ==========================================
// 测试范围:
// 1. 多级谱系: 根定位、节点嵌套、日期排序
// 2. 闭合律: 全局进度 = 全树完成量 / 根计划量 (1e-6 容差)
// 3. 不变式: 同父同日重复链接 → DuplicateLink
// ==========================================


use test_helpers::{date, TestEnv};
use workshop_mes::domain::task::{ContinuationLink, TaskFragment};
use workshop_mes::domain::types::TaskState;
use workshop_mes::repository::RepositoryError;

/// 三级谱系: A(100, 完成40) → B(60, 完成20) → C(40, 完成0)
fn seed_three_level_chain(env: &TestEnv) -> (TaskFragment, TaskFragment, TaskFragment) {
    let program = env.seed_program("谱系测试程序", date(2024, 6, 3));
    let order = env.seed_order(&program.program_id, "OT-7001", 100.0, Some(1.0));
    let item = env.seed_route_item(&order.order_id, 1, "CORTE", "M1", 10.0, 100.0);

    let a = env.seed_task(
        &program.program_id,
        &item.route_item_id,
        date(2024, 6, 3),
        1,
        100.0,
        40.0,
        Some(40.0),
        TaskState::Continued,
    );
    let b = env.seed_task(
        &program.program_id,
        &item.route_item_id,
        date(2024, 6, 4),
        1,
        60.0,
        20.0,
        Some(20.0),
        TaskState::Continued,
    );
    let c = env.seed_task(
        &program.program_id,
        &item.route_item_id,
        date(2024, 6, 5),
        1,
        40.0,
        0.0,
        None,
        TaskState::Pending,
    );

    env.mark_continuation(&b.task_id, 1);
    env.mark_continuation(&c.task_id, 2);
    env.seed_link(&a, &b, 60.0);
    env.seed_link(&b, &c, 40.0);

    (a, b, c)
}

#[test]
fn test_genealogy_三级链条嵌套正确() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let (a, b, c) = seed_three_level_chain(&env);

    let tree = env
        .state
        .task_api
        .get_genealogy(&a.task_id)
        .expect("谱系查询失败");

    assert_eq!(tree.root_task_id, a.task_id);
    assert_eq!(tree.total_quantity, 100.0);
    assert!(!tree.root.is_continuation);

    // A → B → C 按日期逐级嵌套
    assert_eq!(tree.root.children.len(), 1);
    let node_b = &tree.root.children[0];
    assert_eq!(node_b.task_id, b.task_id);
    assert!(node_b.is_continuation);
    assert_eq!(node_b.children.len(), 1);
    let node_c = &node_b.children[0];
    assert_eq!(node_c.task_id, c.task_id);
    assert!(node_c.children.is_empty());
}

#[test]
fn test_genealogy_闭合律() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let (a, _, _) = seed_three_level_chain(&env);

    let tree = env
        .state
        .task_api
        .get_genealogy(&a.task_id)
        .expect("谱系查询失败");

    // 全树完成 40 + 20 + 0 = 60, 根计划 100 → 60%
    let expected = (40.0 + 20.0 + 0.0) / 100.0 * 100.0;
    assert!((tree.global_progress - expected).abs() < 1e-6);
}

#[test]
fn test_genealogy_从中间节点回溯到根() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let (a, _, c) = seed_three_level_chain(&env);

    // 从叶子节点查询, 得到同一棵树
    let tree = env
        .state
        .task_api
        .get_genealogy(&c.task_id)
        .expect("谱系查询失败");

    assert_eq!(tree.root_task_id, a.task_id);
    assert_eq!(tree.total_quantity, 100.0);
}

#[test]
fn test_genealogy_工序机台上下文() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let (a, _, _) = seed_three_level_chain(&env);

    let tree = env
        .state
        .task_api
        .get_genealogy(&a.task_id)
        .expect("谱系查询失败");

    assert_eq!(tree.process_description, "工序 CORTE");
    assert_eq!(tree.machine_code, "M1");
}

#[test]
fn test_record_link_同父同日重复被拒绝() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let program = env.seed_program("重复链接测试", date(2024, 6, 3));
    let order = env.seed_order(&program.program_id, "OT-8001", 100.0, Some(1.0));
    let item = env.seed_route_item(&order.order_id, 1, "CORTE", "M1", 10.0, 100.0);

    let parent = env.seed_task(
        &program.program_id,
        &item.route_item_id,
        date(2024, 6, 3),
        1,
        100.0,
        40.0,
        Some(40.0),
        TaskState::Continued,
    );
    let child = env.seed_task(
        &program.program_id,
        &item.route_item_id,
        date(2024, 6, 4),
        1,
        60.0,
        0.0,
        None,
        TaskState::Pending,
    );

    env.seed_link(&parent, &child, 60.0);

    // 同一父、同一天的第二条链接必须失败
    let another_child = env.seed_task(
        &program.program_id,
        &item.route_item_id,
        date(2024, 6, 5),
        1,
        60.0,
        0.0,
        None,
        TaskState::Pending,
    );

    let duplicate = ContinuationLink {
        parent_task_id: parent.task_id.clone(),
        child_task_id: another_child.task_id.clone(),
        carried_quantity: 60.0,
        carried_weight_kg: 60.0,
        percent_complete_at_split: 40.0,
        target_date: date(2024, 6, 4), // 与首条链接同日
        created_at: TestEnv::now(),
    };

    let result = env.link_repo.record_link(&duplicate);
    assert!(
        matches!(result, Err(RepositoryError::DuplicateLink { .. })),
        "同父同日第二条链接应返回 DuplicateLink"
    );
}
