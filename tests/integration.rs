//! End-to-end scenarios for the call-center rules engine.
//!
//! This suite drives the public workflows against an in-memory datastore
//! loaded with the shipped rules:
//! - Trainee promotion from trigger to approval
//! - Batch status checks and their application
//! - The A-grade demotion challenge
//! - Payroll formula, payment guard and year-end archiving
//! - Rollback when the audit log fails
//! - The boundary result shape

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::Value;
use uuid::Uuid;

use callcenter_engine::calculation::daily_commission;
use callcenter_engine::config::{ConfigLoader, RulesConfig};
use callcenter_engine::error::{EngineError, EngineResult, ErrorKind};
use callcenter_engine::models::{
    Actor, AuditEntry, ChallengeDecision, Employee, Grade, PaymentMethod, PayrollStatus, Role,
    TrainingAssessment, User, YearMonth,
};
use callcenter_engine::store::{AuditLog, AuditSink, Datastore, Outbox, PerformanceLedger};
use callcenter_engine::workflow::challenge::{
    batch_check_challenges, decide, finalize_challenge, trigger_demotion_alert,
};
use callcenter_engine::workflow::payroll::{
    PaymentDetails, archive_year, compute_salary, confirm_for_payment, generate_for_month,
    mark_payment,
};
use callcenter_engine::workflow::performance::{record_daily_performance, record_training_assessment};
use callcenter_engine::workflow::promotion::{approve, trigger_promotion_confirmation};
use callcenter_engine::workflow::status::{apply_recommendations, batch_check_all_employees};
use callcenter_engine::workflow::{EngineContext, outcome};

// =============================================================================
// Test Helpers
// =============================================================================

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn load_rules() -> RulesConfig {
    ConfigLoader::load("./config/callcenter")
        .expect("Failed to load config")
        .into_rules()
}

fn admin() -> Actor {
    Actor::new(1, "系统管理员", Role::Admin)
}

fn manager() -> Actor {
    Actor::manager(2, "王经理", "一组")
}

fn finance() -> Actor {
    Actor::new(3, "财务小李", Role::Finance)
}

struct World {
    store: Datastore,
    rules: RulesConfig,
    audit: AuditLog,
    outbox: Outbox,
}

impl World {
    fn new() -> Self {
        let rules = load_rules();
        let mut store = Datastore::new(&rules);
        for (username, role) in [("admin", Role::Admin), ("manager", Role::Manager)] {
            store.add_user(User {
                id: 0,
                username: username.to_string(),
                role,
                employee_id: None,
                team: Some("一组".to_string()),
            });
        }
        Self {
            store,
            rules,
            audit: AuditLog::new(),
            outbox: Outbox::new(),
        }
    }

    fn ctx(&mut self, today: NaiveDate) -> EngineContext<'_> {
        EngineContext::new(
            &mut self.store,
            &self.rules,
            &mut self.audit,
            &mut self.outbox,
            today,
        )
    }

    fn hire(&mut self, no: &str, name: &str, grade: Grade, join: NaiveDate) -> u64 {
        let id = self
            .store
            .add_employee(Employee::new(0, no, name, "一组", grade, join));
        self.store.add_user(User {
            id: 0,
            username: no.to_lowercase(),
            role: Role::Employee,
            employee_id: Some(id),
            team: Some("一组".to_string()),
        });
        id
    }

    fn orders(&mut self, employee_id: u64, day: NaiveDate, orders: u32) {
        self.store
            .upsert_daily_record(
                employee_id,
                day,
                orders,
                daily_commission(i64::from(orders)),
                true,
            )
            .unwrap();
    }

    fn titles_for(&self, employee_id: u64) -> Vec<String> {
        let user_id = self.store.user_for_employee(employee_id).unwrap().id;
        self.outbox
            .for_user(user_id)
            .map(|m| m.title.clone())
            .collect()
    }
}

struct FailingAudit;

impl AuditSink for FailingAudit {
    fn record(&mut self, _entry: AuditEntry) -> EngineResult<Uuid> {
        Err(EngineError::Collaborator {
            name: "audit",
            message: "connection reset".to_string(),
        })
    }
}

// =============================================================================
// Promotion
// =============================================================================

#[test]
fn test_trainee_promotion_end_to_end() {
    let mut world = World::new();
    let id = world.hire("E001", "张三", Grade::Trainee, date(2025, 1, 1));
    let today = date(2025, 1, 3);

    let mut ctx = world.ctx(today);
    let refused = trigger_promotion_confirmation(&mut ctx, id, &manager()).unwrap_err();
    assert_eq!(refused.kind(), ErrorKind::PolicyViolation);
    assert!(refused.user_message().contains("未通过培训考核"));

    record_training_assessment(&mut ctx, id, today, true, true, &manager()).unwrap();
    let receipt = trigger_promotion_confirmation(&mut ctx, id, &manager()).unwrap();
    assert_eq!(receipt.message, "晋级确认已触发：trainee → C");
    let promotion_id = receipt.record_id.unwrap();

    let again = trigger_promotion_confirmation(&mut ctx, id, &manager()).unwrap_err();
    assert_eq!(again.user_message(), "已有待审批的晋级申请");

    let approved = approve(&mut ctx, promotion_id, &manager()).unwrap();
    assert_eq!(approved.message, "晋级已批准，将于2025-01-04生效");

    assert_eq!(world.store.employee(id).unwrap().grade, Grade::C);
    let history: Vec<_> = world.store.history_of(id).collect();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].change_date, date(2025, 1, 4));
    assert_eq!(history[0].reason, "晋级确认通过（王经理批准）");
    assert_eq!(world.titles_for(id), vec!["晋级通过"]);
    assert_eq!(
        world
            .outbox
            .messages()
            .filter(|m| m.title == "晋级待审批")
            .count(),
        1
    );
}

// =============================================================================
// Status engine
// =============================================================================

#[test]
fn test_batch_check_is_read_only_until_applied() {
    let mut world = World::new();
    let trainee = world.hire("E001", "张三", Grade::Trainee, date(2025, 1, 1));
    world.hire("E002", "李四", Grade::Trainee, date(2025, 1, 3));
    let today = date(2025, 1, 4);

    let mut ctx = world.ctx(today);
    let first = batch_check_all_employees(&ctx).unwrap();
    let second = batch_check_all_employees(&ctx).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].employee_id, trainee);

    let report = apply_recommendations(&mut ctx, &first, &admin()).unwrap();
    assert_eq!(report.applied, vec![trainee]);
    assert!(batch_check_all_employees(&ctx).unwrap().is_empty());

    let replay = apply_recommendations(&mut ctx, &first, &admin()).unwrap();
    assert!(replay.applied.is_empty());
    assert_eq!(world.store.history_of(trainee).count(), 1);
}

// =============================================================================
// Demotion challenge
// =============================================================================

#[test]
fn test_demotion_challenge_success() {
    let mut world = World::new();
    let id = world.hire("E001", "张三", Grade::A, date(2024, 12, 1));
    for day in 5..=10 {
        world.orders(id, date(2025, 1, day), 1);
    }

    let mut ctx = world.ctx(date(2025, 1, 10));
    let alert = trigger_demotion_alert(&mut ctx, id, &admin()).unwrap();
    assert_eq!(
        alert.message,
        "降级预警已触发：最近6个工作日出单6单，低于12单阈值"
    );
    let challenge_id = alert.record_id.unwrap();

    let started = decide(
        &mut ctx,
        challenge_id,
        ChallengeDecision::Challenge,
        &manager(),
        Some("给一次机会"),
    )
    .unwrap();
    assert_eq!(started.message, "保级挑战已启动：2025-01-11 至 2025-01-13");
    for day in 11..=13 {
        record_daily_performance(&mut ctx, id, date(2025, 1, day), 3, &manager()).unwrap();
    }

    let mut ctx = world.ctx(date(2025, 1, 14));
    let reviews = batch_check_challenges(&ctx).unwrap();
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0].progress.message(), "挑战成功：出单9单（目标9单）");

    let receipt = finalize_challenge(&mut ctx, challenge_id, &manager()).unwrap();
    assert_eq!(receipt.message, "保级挑战成功，维持A级");

    let employee = world.store.employee(id).unwrap();
    assert_eq!(employee.grade, Grade::A);
    assert!(!employee.is_in_challenge());
    assert_eq!(
        world.titles_for(id),
        vec!["降级预警通知", "保级挑战已启动", "保级挑战成功"]
    );
}

// =============================================================================
// Payroll
// =============================================================================

#[test]
fn test_a_grade_payroll_formula() {
    let mut world = World::new();
    let id = world.hire("E001", "张三", Grade::A, date(2024, 6, 1));
    // 88 orders over the first 19 days, then 2 a day for the last 6 records.
    for day in 1..=19 {
        world.orders(id, date(2025, 1, day), if day <= 12 { 5 } else { 4 });
    }
    for day in 20..=25 {
        world.orders(id, date(2025, 1, day), 2);
    }
    let expected_commission = daily_commission(5) * Decimal::from(12)
        + daily_commission(4) * Decimal::from(7)
        + daily_commission(2) * Decimal::from(6);
    let month = YearMonth::new(2025, 1).unwrap();

    let mut ctx = world.ctx(date(2025, 2, 1));
    let salary = compute_salary(&ctx, id, month).unwrap();
    assert_eq!(salary.valid_work_days, 25);
    assert_eq!(salary.total_orders, 100);
    assert_eq!(salary.base_salary, Decimal::from(2200));
    assert_eq!(salary.attendance_bonus, Decimal::from(400));
    assert_eq!(salary.performance_bonus, Decimal::from(600));
    assert_eq!(salary.commission, expected_commission);
    assert_eq!(
        salary.total_salary(),
        Decimal::from(3200) + expected_commission
    );

    generate_for_month(&mut ctx, month, false, &finance()).unwrap();
    let record = world.store.payrolls().find(|p| p.employee_id == id).unwrap();
    assert_eq!(record.total_salary, salary.total_salary());
    assert_eq!(record.grade_at_time, Grade::A);
}

#[test]
fn test_bank_transfer_requires_matching_holder() {
    let mut world = World::new();
    let id = world.hire("E001", "张三", Grade::C, date(2024, 12, 1));
    for day in 6..=8 {
        world.orders(id, date(2025, 1, day), 1);
    }
    {
        let employee = world.store.employee_mut(id).unwrap();
        employee.bank_account_number = Some("6222020000000001".to_string());
        employee.account_holder_name = Some("张叁".to_string());
    }

    let mut ctx = world.ctx(date(2025, 2, 5));
    generate_for_month(&mut ctx, YearMonth::new(2025, 1).unwrap(), false, &finance()).unwrap();
    let payroll_id = ctx.store.payrolls().next().unwrap().id;
    confirm_for_payment(&mut ctx, payroll_id, &finance()).unwrap();

    let transfer = PaymentDetails::new(PaymentMethod::BankTransfer);
    let refused = mark_payment(&mut ctx, payroll_id, transfer.clone(), &finance());
    let shape = outcome(refused);
    assert!(!shape.success);
    assert_eq!(shape.message, "银行卡户名与员工姓名不符，不能使用银行转账");

    ctx.store.employee_mut(id).unwrap().account_holder_name = Some("张三".to_string());
    mark_payment(&mut ctx, payroll_id, transfer, &finance()).unwrap();
    assert_eq!(
        world.store.payroll(payroll_id).unwrap().status,
        PayrollStatus::Paid
    );
}

#[test]
fn test_archive_refused_while_unpaid() {
    let mut world = World::new();
    let paid_id = world.hire("E001", "张三", Grade::C, date(2024, 12, 1));
    let unpaid_id = world.hire("E002", "李四", Grade::C, date(2024, 12, 1));
    for employee_id in [paid_id, unpaid_id] {
        world.orders(employee_id, date(2025, 3, 3), 1);
    }

    let mut ctx = world.ctx(date(2025, 12, 31));
    generate_for_month(&mut ctx, YearMonth::new(2025, 3).unwrap(), false, &finance()).unwrap();
    let paid_payroll = ctx
        .store
        .payrolls()
        .find(|p| p.employee_id == paid_id)
        .unwrap()
        .id;
    confirm_for_payment(&mut ctx, paid_payroll, &finance()).unwrap();
    mark_payment(
        &mut ctx,
        paid_payroll,
        PaymentDetails::new(PaymentMethod::Cash),
        &finance(),
    )
    .unwrap();

    let refused = archive_year(&mut ctx, 2025, &admin()).unwrap_err();
    assert_eq!(refused.user_message(), "2025年存在1条未发放工资单，不能归档");
    assert!(world.store.payrolls().all(|p| !p.is_archived));
    assert!(world.store.archive(2025).is_none());
}

// =============================================================================
// Failure handling
// =============================================================================

#[test]
fn test_audit_failure_rolls_back_promotion() {
    let mut world = World::new();
    let id = world.hire("E001", "张三", Grade::Trainee, date(2025, 1, 1));
    world.store.add_assessment(TrainingAssessment {
        id: 0,
        employee_id: id,
        assessment_date: date(2025, 1, 2),
        script_passed: true,
        mock_order_passed: true,
        assessor_name: "王经理".to_string(),
    });

    let mut audit = FailingAudit;
    let mut ctx = EngineContext::new(
        &mut world.store,
        &world.rules,
        &mut audit,
        &mut world.outbox,
        date(2025, 1, 3),
    );
    let result = trigger_promotion_confirmation(&mut ctx, id, &manager());
    let shape = outcome(result);

    assert!(!shape.success);
    assert_eq!(shape.message, "系统错误，请稍后重试");
    assert_eq!(world.store.promotions().count(), 0);
    assert!(world.outbox.is_empty());
}

#[test]
fn test_outcome_shape_has_only_success_and_message() {
    let mut world = World::new();
    let mut ctx = world.ctx(date(2025, 1, 3));
    let missing = approve(&mut ctx, 404, &manager());
    let value: Value = serde_json::to_value(outcome(missing)).unwrap();

    let object = value.as_object().unwrap();
    assert_eq!(object.len(), 2);
    assert_eq!(object["success"], Value::Bool(false));
    assert_eq!(object["message"], Value::String("晋级记录不存在".to_string()));
}
