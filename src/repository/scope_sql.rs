// ==========================================
// 生产台账引擎 - 统计范围 SQL 构建
// ==========================================
// 职责: 把 ScopeFilter 转为 WHERE 片段 + 参数列表
// 约束: 只生成 `?` 占位符，取值全部走参数绑定
// ==========================================

use crate::domain::metrics::ScopeFilter;

/// WHERE 片段及其绑定参数（按出现顺序）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScopeClause {
    pub sql: String,
    pub params: Vec<String>,
}

/// 生成 `IN (?, ?, ...)` 占位符
pub fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// 构建统计范围过滤条件
///
/// # 参数
/// - `filter`: 统计范围
/// - `machine_alias`: machine 表别名（需提供 company_id / group_id / machine_id 列）
/// - `operator_column`: 操作员列（None 表示该查询不按操作员过滤）
///
/// # 返回
/// 以 " AND " 开头的片段；无过滤条件时为空串
pub fn build_scope_clause(
    filter: &ScopeFilter,
    machine_alias: &str,
    operator_column: Option<&str>,
) -> ScopeClause {
    let mut clause = ScopeClause::default();

    if let Some(company_id) = &filter.company_id {
        clause.sql.push_str(&format!(" AND {}.company_id = ?", machine_alias));
        clause.params.push(company_id.clone());
    }

    if !filter.group_ids.is_empty() {
        clause.sql.push_str(&format!(
            " AND {}.group_id IN ({})",
            machine_alias,
            placeholders(filter.group_ids.len())
        ));
        clause.params.extend(filter.group_ids.iter().cloned());
    }

    if !filter.machine_ids.is_empty() {
        clause.sql.push_str(&format!(
            " AND {}.machine_id IN ({})",
            machine_alias,
            placeholders(filter.machine_ids.len())
        ));
        clause.params.extend(filter.machine_ids.iter().cloned());
    }

    if let Some(column) = operator_column {
        if !filter.operator_ids.is_empty() {
            clause.sql.push_str(&format!(
                " AND {} IN ({})",
                column,
                placeholders(filter.operator_ids.len())
            ));
            clause.params.extend(filter.operator_ids.iter().cloned());
        }
    }

    clause
}
