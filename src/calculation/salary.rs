//! Monthly salary formula.
//!
//! The formula is chosen by the employee's grade at computation time and
//! reads only that month's performance records.

use std::fmt::Write as _;

use rust_decimal::Decimal;

use crate::config::PayrollRules;
use crate::models::{DailyPerformance, Employee, Grade, SalaryBreakdown, YearMonth};

use super::total_commission;

/// Computes one employee's salary for `year_month`.
///
/// Records outside the month are ignored.
///
/// | Grade | Base | Attendance | Performance |
/// |---|---|---|---|
/// | trainee, eliminated | 0 | 0 | 0 |
/// | C | `min(30 × qualified, 90)`, qualified = 3 if work days ≥ 3 else 0 | 0 | 0 |
/// | B | `88 × min(work days, 6)` | 0 | 0 |
/// | A | 2200 | 400 when valid days ≥ 25 and the latest 6 records hold ≥ 12 orders | tiered on monthly orders |
///
/// Commission is always the sum of daily commissions.
///
/// # Example
///
/// ```
/// use callcenter_engine::calculation::calculate_salary;
/// use callcenter_engine::config::PayrollRules;
/// use callcenter_engine::models::{DailyPerformance, Employee, Grade, YearMonth};
/// use chrono::NaiveDate;
/// use rust_decimal::Decimal;
///
/// let join = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
/// let employee = Employee::new(1, "E001", "张三", "一组", Grade::B, join);
/// let records: Vec<DailyPerformance> = (1..=4)
///     .map(|d| DailyPerformance {
///         employee_id: 1,
///         work_date: NaiveDate::from_ymd_opt(2025, 1, d).unwrap(),
///         orders_count: 1,
///         commission: Decimal::from(10),
///         is_valid_workday: true,
///     })
///     .collect();
///
/// let month = YearMonth::new(2025, 1).unwrap();
/// let salary = calculate_salary(&employee, month, &records, &PayrollRules::default());
/// assert_eq!(salary.base_salary, Decimal::from(352));
/// assert_eq!(salary.commission, Decimal::from(40));
/// ```
pub fn calculate_salary(
    employee: &Employee,
    year_month: YearMonth,
    records: &[DailyPerformance],
    rules: &PayrollRules,
) -> SalaryBreakdown {
    let mut month_records: Vec<&DailyPerformance> = records
        .iter()
        .filter(|r| r.employee_id == employee.id && year_month.contains(r.work_date))
        .collect();
    month_records.sort_by_key(|r| r.work_date);

    let work_days = month_records.len() as u32;
    let valid_work_days = month_records.iter().filter(|r| r.is_valid_workday).count() as u32;
    let total_orders = month_records
        .iter()
        .fold(0u32, |sum, r| sum.saturating_add(r.orders_count));
    let commission = total_commission(month_records.iter().copied());

    let mut detail = String::new();
    let _ = writeln!(detail, "员工: {} ({})", employee.name, employee.employee_no);
    let _ = writeln!(detail, "状态: {}", employee.grade);
    let _ = writeln!(detail, "月份: {}", year_month);
    let _ = writeln!(detail, "工作日数: {}, 有效工作日: {}", work_days, valid_work_days);
    let _ = writeln!(detail, "总订单数: {}, 总提成: ¥{:.2}", total_orders, commission);
    detail.push('\n');

    let mut base_salary = Decimal::ZERO;
    let mut attendance_bonus = Decimal::ZERO;
    let mut performance_bonus = Decimal::ZERO;

    match employee.grade {
        Grade::Trainee | Grade::Eliminated => {
            let _ = writeln!(detail, "【培训期薪资】");
            let _ = writeln!(detail, "- 固定薪资: ¥0");
            let _ = writeln!(detail, "- 提成: ¥{:.2}", commission);
        }
        Grade::C => {
            let c = &rules.c_grade;
            let qualified = work_days >= c.qualifying_days;
            let qualified_days = if qualified { c.qualifying_days } else { 0 };
            base_salary = (c.daily_rate * Decimal::from(qualified_days)).min(c.cap);
            let _ = writeln!(detail, "【C级薪资】");
            let _ = writeln!(
                detail,
                "- 工作日数: {} ({})",
                work_days,
                if qualified { "达标" } else { "未达标" }
            );
            let _ = writeln!(
                detail,
                "- 固定薪资: min({}×{}, {}) = ¥{:.2}",
                qualified_days, c.daily_rate, c.cap, base_salary
            );
            let _ = writeln!(detail, "- 提成: ¥{:.2}", commission);
        }
        Grade::B => {
            let b = &rules.b_grade;
            let paid_days = work_days.min(b.max_days);
            base_salary = b.daily_rate * Decimal::from(paid_days);
            let _ = writeln!(detail, "【B级薪资】");
            let _ = writeln!(detail, "- 前{}天出勤: {}天", b.max_days, paid_days);
            let _ = writeln!(
                detail,
                "- 固定薪资: {}×{} = ¥{:.2}",
                paid_days, b.daily_rate, base_salary
            );
            let _ = writeln!(detail, "- 提成: ¥{:.2}", commission);
        }
        Grade::A => {
            let a = &rules.a_grade;
            base_salary = a.base_salary;

            let recent_orders: u32 = month_records
                .iter()
                .rev()
                .take(a.attendance_recent_records)
                .fold(0u32, |sum, r| sum.saturating_add(r.orders_count));
            let _ = writeln!(detail, "【A级薪资】");
            if valid_work_days >= a.attendance_min_valid_days
                && recent_orders >= a.attendance_min_recent_orders
            {
                attendance_bonus = a.attendance_bonus;
                let _ = writeln!(
                    detail,
                    "- 全勤奖: 有效出勤{}≥{} 且 最近{}日出单{}≥{}，奖励¥{}",
                    valid_work_days,
                    a.attendance_min_valid_days,
                    a.attendance_recent_records,
                    recent_orders,
                    a.attendance_min_recent_orders,
                    attendance_bonus
                );
            } else {
                let _ = writeln!(
                    detail,
                    "- 全勤奖: 未达标 (有效出勤{}, 最近{}日出单{}) ¥0",
                    valid_work_days, a.attendance_recent_records, recent_orders
                );
            }

            performance_bonus = a.performance_bonus(total_orders);
            let _ = writeln!(
                detail,
                "- 绩效奖: 总单{} → ¥{}",
                total_orders, performance_bonus
            );
            let _ = writeln!(detail, "- 底薪: ¥{}", base_salary);
            let _ = writeln!(detail, "- 提成: ¥{:.2}", commission);
        }
    }

    let total = base_salary + attendance_bonus + performance_bonus + commission;
    detail.push('\n');
    let _ = write!(detail, "【总计】 ¥{:.2}", total);

    SalaryBreakdown {
        employee_id: employee.id,
        year_month,
        grade: employee.grade,
        work_days,
        valid_work_days,
        total_orders,
        base_salary,
        attendance_bonus,
        performance_bonus,
        commission,
        calculation_detail: detail,
    }
}
