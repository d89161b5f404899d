// ==========================================
// 工单导入与任务生成集成测试
// ==========================================
// 测试范围:
// 1. CSV 导入: 工单建档、行级错误不中止批次
// 2. 任务生成: 按工作日产能切分、程序结束日期刷新
// 3. 重新生成: 清空旧片段与日结记录
// ==========================================


use test_helpers::{date, TestEnv};
use workshop_mes::domain::types::TaskState;

const CSV_HEADER: &str = "order_code,product_description,target_quantity,unit_weight_kg,sequence,process_code,process_description,machine_id,machine_code,standard_rate,quantity";

#[test]
fn test_import_建档并收集行级错误() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let program = env.seed_program("导入程序", date(2024, 6, 3));

    let csv = format!(
        "{}\n\
         OT-100,眼镜螺丝,150,0.5,1,CORTE,切割,M1,M1,10,150\n\
         OT-100,眼镜螺丝,150,0.5,2,TORNO,车削,M2,M2,15,150\n\
         OT-101,垫片,80,0.2,1,CORTE,切割,M1,M1,0,80\n\
         OT-102,销轴,60,0.8,1,FRESA,铣削,M3,M3,12,60\n",
        CSV_HEADER
    );

    let result = env
        .state
        .program_api
        .import_work_orders(&program.program_id, csv.as_bytes())
        .expect("导入失败");

    // OT-101 标准产率为 0 → 行级错误; 其余正常入库
    assert_eq!(result.imported_orders, 2);
    assert_eq!(result.imported_route_items, 3);
    assert_eq!(result.skipped_rows, 1);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].line, 4);

    // 工单按导入顺序获得优先级
    let orders = env
        .program_repo
        .list_work_orders(&program.program_id)
        .expect("查询失败");
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0].0.order_code, "OT-100");
    assert_eq!(orders[0].1, 1);
    assert_eq!(orders[1].0.order_code, "OT-102");
    assert_eq!(orders[1].1, 2);
}

#[tokio::test]
async fn test_generate_按日产能切分() {
    let env = TestEnv::new().expect("无法创建测试环境");
    // 2024-06-03 是周一
    let program = env.seed_program("生成程序", date(2024, 6, 3));
    let order = env.seed_order(&program.program_id, "OT-200", 150.0, Some(2.0));
    let item = env.seed_route_item(&order.order_id, 1, "CORTE", "M1", 10.0, 150.0);

    let count = env
        .state
        .program_api
        .regenerate_tasks(&program.program_id, TestEnv::now())
        .await
        .expect("生成失败");

    // 周一产能 9h*10 = 90 件, 余 60 件落到周二
    assert_eq!(count, 2);

    let monday = env
        .task_repo
        .list_for_day(&program.program_id, date(2024, 6, 3))
        .expect("查询失败");
    assert_eq!(monday.len(), 1);
    assert_eq!(monday[0].quantity_programmed, 90.0);
    assert_eq!(monday[0].weight_programmed_kg, 180.0);
    assert_eq!(monday[0].state, TaskState::Pending);
    assert_eq!(monday[0].route_item_id, item.route_item_id);

    let tuesday = env
        .task_repo
        .list_for_day(&program.program_id, date(2024, 6, 4))
        .expect("查询失败");
    assert_eq!(tuesday.len(), 1);
    assert_eq!(tuesday[0].quantity_programmed, 60.0);

    // 程序结束日期 = 最晚片段日期
    let refreshed = env
        .state
        .program_api
        .get_program(&program.program_id)
        .expect("查询失败");
    assert_eq!(refreshed.end_date, Some(date(2024, 6, 4)));
}

#[tokio::test]
async fn test_generate_周五起步跨周末() {
    let env = TestEnv::new().expect("无法创建测试环境");
    // 2024-06-07 是周五 (8 小时工作日)
    let program = env.seed_program("跨周末生成", date(2024, 6, 7));
    let order = env.seed_order(&program.program_id, "OT-201", 100.0, Some(1.0));
    env.seed_route_item(&order.order_id, 1, "CORTE", "M1", 10.0, 100.0);

    env.state
        .program_api
        .regenerate_tasks(&program.program_id, TestEnv::now())
        .await
        .expect("生成失败");

    // 周五 80 件, 周末跳过, 周一 20 件
    let friday = env
        .task_repo
        .list_for_day(&program.program_id, date(2024, 6, 7))
        .expect("查询失败");
    assert_eq!(friday[0].quantity_programmed, 80.0);

    let monday = env
        .task_repo
        .list_for_day(&program.program_id, date(2024, 6, 10))
        .expect("查询失败");
    assert_eq!(monday[0].quantity_programmed, 20.0);
}

#[tokio::test]
async fn test_regenerate_清空旧片段与日结() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let program = env.seed_program("重置程序", date(2024, 6, 3));
    let order = env.seed_order(&program.program_id, "OT-202", 50.0, Some(1.0));
    let item = env.seed_route_item(&order.order_id, 1, "CORTE", "M1", 10.0, 50.0);

    // 手工片段 + 已日结的一天
    env.seed_task(
        &program.program_id,
        &item.route_item_id,
        date(2024, 6, 3),
        1,
        50.0,
        10.0,
        Some(10.0),
        TaskState::InProgress,
    );
    env.state
        .program_api
        .finalize_day(
            &program.program_id,
            date(2024, 6, 3),
            "supervisor",
            TestEnv::now(),
        )
        .await
        .expect("日结失败");

    assert!(env
        .day_report_repo
        .is_finalized(&program.program_id, date(2024, 6, 3))
        .expect("查询失败"));

    // 重新生成: 旧片段、旧日结记录全部清空
    env.state
        .program_api
        .regenerate_tasks(&program.program_id, TestEnv::now())
        .await
        .expect("重新生成失败");

    assert!(!env
        .day_report_repo
        .is_finalized(&program.program_id, date(2024, 6, 3))
        .expect("查询失败"));

    let tasks = env
        .task_repo
        .list_for_program(&program.program_id)
        .expect("查询失败");
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].quantity_programmed, 50.0);
    assert!(!tasks[0].is_continuation);
}

#[tokio::test]
async fn test_daily_summary_汇总与日结标记() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let program = env.seed_program("汇总程序", date(2024, 6, 3));
    let order = env.seed_order(&program.program_id, "OT-203", 200.0, Some(1.0));
    let i1 = env.seed_route_item(&order.order_id, 1, "CORTE", "M1", 10.0, 100.0);
    let i2 = env.seed_route_item(&order.order_id, 2, "TORNO", "M2", 10.0, 100.0);

    env.seed_task(
        &program.program_id,
        &i1.route_item_id,
        date(2024, 6, 3),
        1,
        100.0,
        100.0,
        Some(100.0),
        TaskState::Completed,
    );
    env.seed_task(
        &program.program_id,
        &i2.route_item_id,
        date(2024, 6, 3),
        2,
        100.0,
        30.0,
        Some(30.0),
        TaskState::InProgress,
    );

    let summary = env
        .state
        .program_api
        .get_daily_summary(&program.program_id, date(2024, 6, 3))
        .expect("汇总失败");

    assert_eq!(summary.task_count, 2);
    assert_eq!(summary.completed_count, 1);
    assert_eq!(summary.total_quantity_programmed, 200.0);
    assert_eq!(summary.total_quantity_completed, 130.0);
    assert_eq!(summary.percent_complete, 50.0);
    assert!(!summary.finalized);

    // 程序整体进度 = 已完成任务占比
    let progress = env
        .state
        .program_api
        .get_program_progress(&program.program_id)
        .expect("进度查询失败");
    assert_eq!(progress, 50.0);
}
