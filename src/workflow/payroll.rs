//! Monthly salary resolution and the payroll record lifecycle.
//!
//! Salaries are resolved per employee and month: a confirmed salary is
//! returned unchanged, otherwise one is computed from the performance
//! ledger. Payroll records are generated from the resolved salaries and then
//! move through `pending → confirmed → paid`, with the `failed → retry` loop
//! and cancellation on the side. Year-end archiving freezes a year.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::calculation::calculate_salary;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    Actor, AdjustmentType, AuditEntry, ConfirmedSalary, MonthlySummary, Notification,
    NotificationType, OperationType, PaymentMethod, PayrollAction, PayrollAdjustment,
    PayrollArchive, PayrollRecord, PayrollStatus, Role, SalaryBreakdown, SalarySource, YearMonth,
};
use crate::store::PerformanceLedger;

use super::{EngineContext, Receipt};

const MODULE: &str = "工资管理";

/// How and when a payroll record was paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDetails {
    /// Payment channel.
    pub method: PaymentMethod,
    /// Defaults to the evaluation date.
    #[serde(default)]
    pub payment_date: Option<NaiveDate>,
    /// Transfer reference.
    #[serde(default)]
    pub reference: Option<String>,
    /// Free-form finance note.
    #[serde(default)]
    pub notes: Option<String>,
}

impl PaymentDetails {
    /// Payment by `method` today with no reference or note.
    pub fn new(method: PaymentMethod) -> Self {
        Self {
            method,
            payment_date: None,
            reference: None,
            notes: None,
        }
    }
}

/// An archive together with its parsed per-month summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveSummary {
    /// The archive aggregate.
    pub archive: PayrollArchive,
    /// One line per archived month.
    pub monthly: Vec<MonthlySummary>,
}

fn require_finance(actor: &Actor, message: &str) -> EngineResult<()> {
    match actor.role {
        Role::Finance | Role::Admin => Ok(()),
        Role::Manager | Role::Employee => Err(EngineError::permission(message)),
    }
}

fn ensure_not_archived(record: &PayrollRecord) -> EngineResult<()> {
    if record.is_archived {
        return Err(EngineError::invalid_state("工资单已归档，不能修改"));
    }
    Ok(())
}

/// The confirmed salary of an employee for a month, if any.
pub fn find_confirmed_salary(
    ctx: &EngineContext<'_>,
    employee_id: u64,
    month: YearMonth,
) -> Option<ConfirmedSalary> {
    ctx.store.confirmed_salary(employee_id, month).cloned()
}

/// Computes a salary from the month's performance records.
///
/// Uses the employee's grade at the time of the call.
pub fn compute_salary(
    ctx: &EngineContext<'_>,
    employee_id: u64,
    month: YearMonth,
) -> EngineResult<SalaryBreakdown> {
    let employee = ctx.store.employee(employee_id)?;
    let records = ctx
        .store
        .records_in_range(employee_id, month.first_day()..=month.last_day());
    Ok(calculate_salary(employee, month, &records, &ctx.rules.payroll))
}

/// Returns the confirmed salary when one exists, else a computed one.
///
/// A confirmed salary is never recomputed.
pub fn resolve_salary(
    ctx: &EngineContext<'_>,
    employee_id: u64,
    month: YearMonth,
) -> EngineResult<SalarySource> {
    match find_confirmed_salary(ctx, employee_id, month) {
        Some(confirmed) => Ok(SalarySource::Confirmed(confirmed)),
        None => compute_salary(ctx, employee_id, month).map(SalarySource::Computed),
    }
}

/// Freezes the computed salary of an employee for a month.
pub fn confirm_salary(
    ctx: &mut EngineContext<'_>,
    employee_id: u64,
    month: YearMonth,
    actor: &Actor,
) -> EngineResult<Receipt> {
    require_finance(actor, "仅财务或管理员可确认薪资")?;
    if ctx.store.confirmed_salary(employee_id, month).is_some() {
        return Err(EngineError::invalid_state(format!("{}月薪资已确认", month)));
    }
    let breakdown = compute_salary(ctx, employee_id, month)?;
    let employee_name = ctx.store.employee(employee_id)?.name.clone();
    let total = breakdown.total_salary();

    ctx.transact(|tx, audit| {
        tx.put_confirmed_salary(ConfirmedSalary {
            breakdown,
            confirmed_by: actor.id,
            confirmed_at: Utc::now(),
        });
        audit.record(
            AuditEntry::new(OperationType::Payroll, MODULE, "确认薪资", actor)
                .employee(employee_id, employee_name.as_str())
                .changes(json!({ "year_month": month.to_string(), "total_salary": total })),
        )?;
        Ok(())
    })?;
    info!(employee_id, year_month = %month, %total, "salary confirmed");
    Ok(Receipt::message(format!("{}月薪资已确认：¥{:.2}", month, total)))
}

/// Creates one pending payroll record per employee for `month`.
///
/// Employees included are the active ones plus anyone with a confirmed
/// salary or performance records in the month. Existing records are a
/// refusal unless `overwrite` is set, in which case they are deleted first
/// together with their adjustments. Archived months cannot be regenerated.
pub fn generate_for_month(
    ctx: &mut EngineContext<'_>,
    month: YearMonth,
    overwrite: bool,
    actor: &Actor,
) -> EngineResult<Receipt> {
    require_finance(actor, "仅财务或管理员可生成工资单")?;
    let in_month: Vec<&PayrollRecord> = ctx
        .store
        .payrolls()
        .filter(|p| p.year_month == month)
        .collect();
    if in_month.iter().any(|p| p.is_archived) {
        return Err(EngineError::invalid_state(format!(
            "{}月工资已归档，不能重新生成",
            month
        )));
    }
    let existing = in_month.len();
    if existing > 0 && !overwrite {
        return Err(EngineError::policy(format!(
            "{}月工资单已存在（{}条）",
            month, existing
        )));
    }

    let with_records: BTreeSet<u64> = ctx
        .store
        .performance_in_month(month)
        .map(|r| r.employee_id)
        .collect();
    let employees: Vec<_> = ctx
        .store
        .employees()
        .filter(|e| {
            e.is_active
                || with_records.contains(&e.id)
                || ctx.store.confirmed_salary(e.id, month).is_some()
        })
        .cloned()
        .collect();
    if employees.is_empty() {
        return Err(EngineError::policy(format!("{}月没有薪资记录", month)));
    }

    let mut lines = Vec::with_capacity(employees.len());
    for employee in &employees {
        let source = resolve_salary(ctx, employee.id, month)?;
        let salary = source.breakdown();
        let subtotal = salary.total_salary();
        lines.push(PayrollRecord {
            id: 0,
            employee_id: employee.id,
            employee_no: employee.employee_no.clone(),
            employee_name: employee.name.clone(),
            team: employee.team.clone(),
            grade_at_time: salary.grade,
            year_month: month,
            base_salary: salary.base_salary,
            attendance_bonus: salary.attendance_bonus,
            performance_bonus: salary.performance_bonus,
            commission: salary.commission,
            subtotal,
            deductions: Decimal::ZERO,
            allowances: Decimal::ZERO,
            total_salary: subtotal,
            status: PayrollStatus::Pending,
            confirmed_by: None,
            confirmed_by_name: None,
            confirmed_at: None,
            payment_method: None,
            payment_date: None,
            payment_reference: None,
            finance_notes: None,
            failure_reason: None,
            is_archived: false,
            archive_year: None,
        });
    }
    let count = lines.len();
    let total: Decimal = lines.iter().map(|l| l.total_salary).sum();

    ctx.transact(|tx, audit| {
        if overwrite {
            let removed = tx.remove_payrolls(|p| p.year_month == month && !p.is_archived);
            info!(year_month = %month, removed, "old payroll records replaced");
        }
        for line in lines {
            tx.insert_payroll(line);
        }
        audit.record(
            AuditEntry::new(OperationType::Payroll, MODULE, "生成工资单", actor).changes(json!({
                "year_month": month.to_string(),
                "count": count,
                "total_amount": total,
                "overwrite": overwrite,
            })),
        )?;
        Ok(())
    })?;
    info!(year_month = %month, count, %total, "payroll generated");

    Ok(Receipt::message(format!(
        "成功生成{}条工资单，总计¥{:.2}",
        count, total
    )))
}

/// Adds a deduction or allowance and recomputes the total.
///
/// Managers may only adjust records of their own team.
pub fn adjust(
    ctx: &mut EngineContext<'_>,
    payroll_id: u64,
    adjustment_type: AdjustmentType,
    amount: Decimal,
    reason: &str,
    actor: &Actor,
) -> EngineResult<Receipt> {
    let record = ctx.store.payroll(payroll_id)?;
    if !actor.can_act_on_team(&record.team) {
        return Err(EngineError::permission("无权限调整其他团队员工工资"));
    }
    ensure_not_archived(record)?;
    match record.status {
        PayrollStatus::Paid => return Err(EngineError::invalid_state("已发放的工资单不能调整")),
        PayrollStatus::Cancelled => {
            return Err(EngineError::invalid_state("已取消的工资单不能调整"));
        }
        PayrollStatus::Pending
        | PayrollStatus::Confirmed
        | PayrollStatus::Failed
        | PayrollStatus::Retry => {}
    }
    if amount <= Decimal::ZERO {
        return Err(EngineError::invalid_input("金额必须大于0"));
    }
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(EngineError::invalid_input("必须填写调整原因"));
    }
    let employee_id = record.employee_id;
    let employee_name = record.employee_name.clone();
    let before = record.total_salary;

    let after = ctx.transact(|tx, audit| {
        let record = tx.payroll_mut(payroll_id)?;
        match adjustment_type {
            AdjustmentType::Deduction => record.deductions += amount,
            AdjustmentType::Allowance => record.allowances += amount,
        }
        record.recompute_total();
        let after = record.total_salary;

        tx.insert_adjustment(PayrollAdjustment {
            id: 0,
            payroll_id,
            adjustment_type,
            amount,
            reason: reason.to_string(),
            adjusted_by: actor.id,
            adjusted_by_name: actor.name.clone(),
            adjusted_by_role: actor.role,
            adjusted_at: Utc::now(),
        });
        audit.record(
            AuditEntry::new(OperationType::Payroll, MODULE, "调整工资", actor)
                .employee(employee_id, employee_name.as_str())
                .record(payroll_id)
                .values(before.to_string(), after.to_string())
                .reason(reason),
        )?;
        Ok(after)
    })?;
    info!(payroll_id, label = adjustment_type.label(), %amount, %after, "payroll adjusted");

    Ok(Receipt::new(
        payroll_id,
        format!("调整成功：{}¥{:.2}", adjustment_type.label(), amount),
    ))
}

/// Adjustments of one payroll record, newest first.
pub fn payroll_adjustments(
    ctx: &EngineContext<'_>,
    payroll_id: u64,
) -> EngineResult<Vec<PayrollAdjustment>> {
    ctx.store.payroll(payroll_id)?;
    let mut adjustments: Vec<_> = ctx.store.adjustments_of(payroll_id).cloned().collect();
    adjustments.reverse();
    Ok(adjustments)
}

/// Finance confirmation of a pending record.
pub fn confirm_for_payment(
    ctx: &mut EngineContext<'_>,
    payroll_id: u64,
    actor: &Actor,
) -> EngineResult<Receipt> {
    require_finance(actor, "仅财务人员可确认工资单")?;
    let record = ctx.store.payroll(payroll_id)?;
    ensure_not_archived(record)?;
    let Some(next) = record.status.apply(PayrollAction::Confirm) else {
        return Err(EngineError::invalid_state(format!(
            "当前状态为{}，不可确认",
            record.status.as_str()
        )));
    };
    let (employee_id, employee_name) = (record.employee_id, record.employee_name.clone());

    ctx.transact(|tx, audit| {
        let record = tx.payroll_mut(payroll_id)?;
        record.status = next;
        record.confirmed_by = Some(actor.id);
        record.confirmed_by_name = Some(actor.name.clone());
        record.confirmed_at = Some(Utc::now());
        audit.record(
            AuditEntry::new(OperationType::Payroll, MODULE, "确认工资单", actor)
                .employee(employee_id, employee_name.as_str())
                .record(payroll_id)
                .values(PayrollStatus::Pending.as_str(), next.as_str()),
        )?;
        Ok(())
    })?;
    info!(payroll_id, "payroll confirmed");
    Ok(Receipt::new(payroll_id, "工资单已确认，可以发放"))
}

/// Confirms every pending record of a month. Running it again confirms nothing.
pub fn batch_confirm(
    ctx: &mut EngineContext<'_>,
    month: YearMonth,
    actor: &Actor,
) -> EngineResult<Receipt> {
    require_finance(actor, "仅财务人员可确认工资单")?;
    let pending: Vec<u64> = ctx
        .store
        .payrolls()
        .filter(|p| p.year_month == month && !p.is_archived && p.status == PayrollStatus::Pending)
        .map(|p| p.id)
        .collect();
    if pending.is_empty() {
        info!(year_month = %month, "no pending payroll to confirm");
        return Ok(Receipt::message("成功确认0条工资单"));
    }

    let count = pending.len();
    ctx.transact(|tx, audit| {
        let now = Utc::now();
        for id in &pending {
            let record = tx.payroll_mut(*id)?;
            record.status = PayrollStatus::Confirmed;
            record.confirmed_by = Some(actor.id);
            record.confirmed_by_name = Some(actor.name.clone());
            record.confirmed_at = Some(now);
        }
        audit.record(
            AuditEntry::new(OperationType::Payroll, MODULE, "批量确认工资单", actor)
                .changes(json!({ "year_month": month.to_string(), "payroll_ids": pending })),
        )?;
        Ok(())
    })?;
    info!(year_month = %month, count, "payroll batch confirmed");
    Ok(Receipt::message(format!("成功确认{}条工资单", count)))
}

/// Records a payment.
///
/// Bank transfers need bank details on file whose holder name matches the
/// employee's name exactly.
pub fn mark_payment(
    ctx: &mut EngineContext<'_>,
    payroll_id: u64,
    details: PaymentDetails,
    actor: &Actor,
) -> EngineResult<Receipt> {
    require_finance(actor, "仅财务人员可发放工资")?;
    let record = ctx.store.payroll(payroll_id)?;
    ensure_not_archived(record)?;
    let Some(next) = record.status.apply(PayrollAction::Pay) else {
        return Err(EngineError::invalid_state(format!(
            "当前状态为{}，不可发放",
            record.status.as_str()
        )));
    };
    let employee = ctx.store.employee(record.employee_id)?;
    if details.method == PaymentMethod::BankTransfer {
        let has_account = employee
            .bank_account_number
            .as_deref()
            .is_some_and(|n| !n.trim().is_empty());
        if !has_account {
            return Err(EngineError::policy("员工未录入银行卡信息"));
        }
        if !employee.has_verified_bank_account() {
            warn!(payroll_id, employee_id = employee.id, "bank account holder mismatch");
            return Err(EngineError::policy("银行卡户名与员工姓名不符，不能使用银行转账"));
        }
    }
    let employee_id = record.employee_id;
    let employee_name = record.employee_name.clone();
    let previous = record.status;
    let total = record.total_salary;
    let month = record.year_month;
    let method = details.method;
    let payment_date = details.payment_date.unwrap_or(ctx.today);

    ctx.transact(|tx, audit| {
        let record = tx.payroll_mut(payroll_id)?;
        record.status = next;
        record.payment_method = Some(method);
        record.payment_date = Some(payment_date);
        record.payment_reference = details.reference;
        record.finance_notes = details.notes;
        record.failure_reason = None;
        audit.record(
            AuditEntry::new(OperationType::Payroll, MODULE, "发放工资", actor)
                .employee(employee_id, employee_name.as_str())
                .record(payroll_id)
                .values(previous.as_str(), next.as_str())
                .changes(json!({
                    "payment_method": method.as_str(),
                    "payment_date": payment_date.to_string(),
                    "total_salary": total,
                })),
        )?;
        Ok(())
    })?;
    info!(payroll_id, method = method.as_str(), %payment_date, "payroll paid");

    ctx.notify_employee(employee_id, |user_id| {
        Notification::new(
            user_id,
            "工资已发放",
            format!("您{}月的工资¥{:.2}已发放", month, total),
            NotificationType::PayrollPaid,
        )
    });
    Ok(Receipt::new(payroll_id, "工资发放成功"))
}

/// Records a failed payment attempt and tells the admins.
pub fn mark_payment_failed(
    ctx: &mut EngineContext<'_>,
    payroll_id: u64,
    reason: &str,
    actor: &Actor,
) -> EngineResult<Receipt> {
    require_finance(actor, "仅财务人员可处理工资发放")?;
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(EngineError::invalid_input("必须填写失败原因"));
    }
    let record = ctx.store.payroll(payroll_id)?;
    ensure_not_archived(record)?;
    let Some(next) = record.status.apply(PayrollAction::Fail) else {
        return Err(EngineError::invalid_state(format!(
            "当前状态为{}，不可标记失败",
            record.status.as_str()
        )));
    };
    let employee_id = record.employee_id;
    let employee_name = record.employee_name.clone();
    let previous = record.status;

    ctx.transact(|tx, audit| {
        let record = tx.payroll_mut(payroll_id)?;
        record.status = next;
        record.failure_reason = Some(reason.to_string());
        audit.record(
            AuditEntry::new(OperationType::Payroll, MODULE, "发放失败", actor)
                .employee(employee_id, employee_name.as_str())
                .record(payroll_id)
                .values(previous.as_str(), next.as_str())
                .reason(reason),
        )?;
        Ok(())
    })?;
    warn!(payroll_id, employee_id, reason, "payroll payment failed");

    let admins: Vec<u64> = ctx.store.users_with_role(Role::Admin).map(|u| u.id).collect();
    let content = format!("员工{}的工资发放失败：{}", employee_name, reason);
    for user_id in admins {
        ctx.notify(
            Notification::new(
                user_id,
                "工资发放失败",
                content.as_str(),
                NotificationType::PayrollPaid,
            )
            .with_link(format!("/finance/payroll/{}", payroll_id)),
        );
    }
    Ok(Receipt::new(payroll_id, "已标记为发放失败"))
}

/// Flags a failed record for another payment attempt.
pub fn retry_payment(
    ctx: &mut EngineContext<'_>,
    payroll_id: u64,
    actor: &Actor,
) -> EngineResult<Receipt> {
    require_finance(actor, "仅财务人员可处理工资发放")?;
    let record = ctx.store.payroll(payroll_id)?;
    ensure_not_archived(record)?;
    let Some(next) = record.status.apply(PayrollAction::Retry) else {
        return Err(EngineError::invalid_state("只有失败状态的工资单可以重试"));
    };
    let employee_id = record.employee_id;
    let employee_name = record.employee_name.clone();
    let previous = record.status;

    ctx.transact(|tx, audit| {
        tx.payroll_mut(payroll_id)?.status = next;
        audit.record(
            AuditEntry::new(OperationType::Payroll, MODULE, "重试发放", actor)
                .employee(employee_id, employee_name.as_str())
                .record(payroll_id)
                .values(previous.as_str(), next.as_str()),
        )?;
        Ok(())
    })?;
    info!(payroll_id, "payroll flagged for retry");
    Ok(Receipt::new(payroll_id, "已设置为待重试状态"))
}

/// Withdraws an unpaid record.
pub fn cancel_payroll(
    ctx: &mut EngineContext<'_>,
    payroll_id: u64,
    reason: &str,
    actor: &Actor,
) -> EngineResult<Receipt> {
    require_finance(actor, "仅财务人员可取消工资单")?;
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(EngineError::invalid_input("必须填写取消原因"));
    }
    let record = ctx.store.payroll(payroll_id)?;
    ensure_not_archived(record)?;
    let Some(next) = record.status.apply(PayrollAction::Cancel) else {
        return Err(EngineError::invalid_state(format!(
            "当前状态为{}，不可取消",
            record.status.as_str()
        )));
    };
    let employee_id = record.employee_id;
    let employee_name = record.employee_name.clone();
    let previous = record.status;

    ctx.transact(|tx, audit| {
        let record = tx.payroll_mut(payroll_id)?;
        record.status = next;
        record.finance_notes = Some(reason.to_string());
        audit.record(
            AuditEntry::new(OperationType::Payroll, MODULE, "取消工资单", actor)
                .employee(employee_id, employee_name.as_str())
                .record(payroll_id)
                .values(previous.as_str(), next.as_str())
                .reason(reason),
        )?;
        Ok(())
    })?;
    info!(payroll_id, "payroll cancelled");
    Ok(Receipt::new(payroll_id, "工资单已取消"))
}

/// Freezes every record of `year` and writes the year aggregate.
///
/// Refused while any record of the year is neither paid nor cancelled, in
/// which case nothing is archived.
pub fn archive_year(ctx: &mut EngineContext<'_>, year: i32, actor: &Actor) -> EngineResult<Receipt> {
    require_finance(actor, "仅财务或管理员可归档工资")?;
    if ctx.store.archive(year).is_some() {
        return Err(EngineError::invalid_state(format!("{}年工资已归档", year)));
    }
    let records: Vec<&PayrollRecord> = ctx
        .store
        .payrolls()
        .filter(|p| p.year_month.year() == year && !p.is_archived)
        .collect();
    let unsettled = records.iter().filter(|p| !p.status.is_settled()).count();
    if unsettled > 0 {
        return Err(EngineError::policy(format!(
            "{}年存在{}条未发放工资单，不能归档",
            year, unsettled
        )));
    }
    if records.is_empty() {
        return Err(EngineError::policy(format!("{}年没有工资记录", year)));
    }

    let mut months: BTreeMap<YearMonth, (BTreeSet<u64>, u32, Decimal)> = BTreeMap::new();
    for record in &records {
        let (employees, count, amount) = months.entry(record.year_month).or_default();
        employees.insert(record.employee_id);
        *count += 1;
        *amount += record.total_salary;
    }
    let monthly: Vec<MonthlySummary> = months
        .into_iter()
        .map(|(year_month, (employees, total_records, total_amount))| MonthlySummary {
            year_month,
            total_employees: employees.len() as u32,
            total_records,
            total_amount,
        })
        .collect();
    let total_employees = records
        .iter()
        .map(|p| p.employee_id)
        .collect::<BTreeSet<_>>()
        .len() as u32;
    let total_records = records.len() as u32;
    let total_amount: Decimal = monthly.iter().map(|m| m.total_amount).sum();
    let summary_json = serde_json::to_string(&monthly)?;
    let ids: Vec<u64> = records.iter().map(|p| p.id).collect();

    ctx.transact(|tx, audit| {
        for id in &ids {
            let record = tx.payroll_mut(*id)?;
            record.is_archived = true;
            record.archive_year = Some(year);
        }
        let archive_id = tx.insert_archive(PayrollArchive {
            id: 0,
            archive_year: year,
            total_employees,
            total_records,
            total_amount,
            summary_json,
            archived_by: actor.id,
            archived_by_name: actor.name.clone(),
            archived_at: Utc::now(),
        });
        audit.record(
            AuditEntry::new(OperationType::Payroll, MODULE, "年度归档", actor)
                .record(archive_id)
                .changes(json!({
                    "archive_year": year,
                    "total_records": total_records,
                    "total_amount": total_amount,
                })),
        )?;
        Ok(())
    })?;
    info!(year, total_records, %total_amount, "payroll year archived");

    Ok(Receipt::message(format!(
        "成功归档{}年工资记录：{}条，总计¥{:.2}",
        year, total_records, total_amount
    )))
}

/// The archive of `year` with its per-month summary; `None` before archiving.
pub fn archive_summary(ctx: &EngineContext<'_>, year: i32) -> EngineResult<Option<ArchiveSummary>> {
    let Some(archive) = ctx.store.archive(year) else {
        return Ok(None);
    };
    let monthly: Vec<MonthlySummary> = if archive.summary_json.is_empty() {
        Vec::new()
    } else {
        serde_json::from_str(&archive.summary_json)?
    };
    Ok(Some(ArchiveSummary {
        archive: archive.clone(),
        monthly,
    }))
}
