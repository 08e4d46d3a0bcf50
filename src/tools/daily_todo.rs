//! Daily To-Do Tool Implementation
//!
//! Returns a fixed list of five task records rendered as a labeled text block.
//! The records are compiled in and rebuilt on every call; nothing is read or
//! written.

use std::fmt;

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;

use crate::core::server::{MCPTool, ToolRegistry};

pub const NAME: &str = "get_daily_todo";

/// Model name handed to the formatter. Kept for call-shape compatibility only.
pub const DEFAULT_MODEL: &str = "sonar";

const HEADER: &str = "待办事项列表:";
const DIVIDER: &str = "---";

/// Arguments accepted by `get_daily_todo`. None of them affect the output.
#[derive(Debug, Default, Deserialize)]
pub struct DailyTodoArgs {
    /// ERP account identifier; advertised in the schema, otherwise unused
    #[allow(dead_code)]
    pub erp: Option<String>,
    /// Conversation messages, forwarded to the formatter and ignored there
    pub messages: Option<Value>,
}

/// Task priority, rendered as 高 / 中 / 低.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    /// 高
    High,
    /// 中
    Medium,
    /// 低
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Priority::High => "高",
            Priority::Medium => "中",
            Priority::Low => "低",
        })
    }
}

/// Task status, rendered as 待处理 / 进行中 / 已完成.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// 待处理: not started
    Pending,
    /// 进行中: being worked on
    InProgress,
    /// 已完成: finished
    Done,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Pending => "待处理",
            Status::InProgress => "进行中",
            Status::Done => "已完成",
        })
    }
}

/// One entry of the to-do list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    /// Short task name, shown after 标题
    pub title: &'static str,
    /// One-line summary of the work, shown after 描述
    pub description: &'static str,
    /// Due date, shown as `YYYY-MM-DD` after 截止日期
    pub due: NaiveDate,
    /// Shown after 优先级
    pub priority: Priority,
    /// Shown after 状态
    pub status: Status,
}

impl fmt::Display for TaskRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "标题: {}", self.title)?;
        writeln!(f, "描述: {}", self.description)?;
        writeln!(f, "截止日期: {}", self.due)?;
        writeln!(f, "优先级: {}", self.priority)?;
        write!(f, "状态: {}", self.status)
    }
}

const fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    match NaiveDate::from_ymd_opt(year, month, day) {
        Some(d) => d,
        None => panic!("invalid task due date"),
    }
}

// Evaluated at compile time, so a bad date fails the build.
const REQUIREMENTS_DUE: NaiveDate = date(2025, 3, 20);
const CODE_REVIEW_DUE: NaiveDate = date(2025, 3, 18);
const DB_TUNING_DUE: NaiveDate = date(2025, 3, 25);
const FEEDBACK_DUE: NaiveDate = date(2025, 3, 19);
const PROGRESS_REPORT_DUE: NaiveDate = date(2025, 3, 21);

/// The five task records, in display order.
pub fn daily_tasks() -> [TaskRecord; 5] {
    [
        TaskRecord {
            title: "完成项目需求文档",
            description: "整理并完善新版本的功能需求，提交产品评审",
            due: REQUIREMENTS_DUE,
            priority: Priority::High,
            status: Status::InProgress,
        },
        TaskRecord {
            title: "代码审查",
            description: "审查团队本周提交的合并请求",
            due: CODE_REVIEW_DUE,
            priority: Priority::Medium,
            status: Status::Pending,
        },
        TaskRecord {
            title: "数据库优化",
            description: "分析慢查询日志并调整订单表索引",
            due: DB_TUNING_DUE,
            priority: Priority::High,
            status: Status::Pending,
        },
        TaskRecord {
            title: "客户反馈处理",
            description: "汇总上周的客户反馈并逐条回复",
            due: FEEDBACK_DUE,
            priority: Priority::Medium,
            status: Status::InProgress,
        },
        TaskRecord {
            title: "项目进度报告",
            description: "编写本周项目进度报告并发送给相关负责人",
            due: PROGRESS_REPORT_DUE,
            priority: Priority::Low,
            status: Status::Done,
        },
    ]
}

/// Render the to-do list.
///
/// `messages` and `model` are accepted for compatibility with the call shape
/// and ignored. The output is identical on every call.
pub fn format_daily_todo(_messages: Option<&Value>, _model: &str) -> String {
    let paragraphs: Vec<String> = daily_tasks().iter().map(ToString::to_string).collect();
    let separator = format!("\n{DIVIDER}\n");
    format!("{HEADER}\n\n{}", paragraphs.join(separator.as_str()))
}

/// Run the tool with already-validated arguments.
pub fn call(args: &DailyTodoArgs) -> String {
    format_daily_todo(args.messages.as_ref(), DEFAULT_MODEL)
}

/// Register the tool descriptor with the registry.
pub fn register(registry: &mut ToolRegistry) {
    registry.register(MCPTool {
        name: NAME.to_string(),
        description: "Get today's to-do list with title, description, due date, priority and status for each task."
            .to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "erp": {
                    "type": "string",
                    "description": "ERP account identifier"
                }
            }
        }),
    });
}
