// ==========================================
// 生产台账引擎 - 操作员目录
// ==========================================
// 职责: 校验操作员是否可以操作某机台（不做身份认证）
// 说明: 以 trait 注入，引擎不关心成员关系的来源
// ==========================================

use crate::domain::machine::Machine;
use crate::engine::error::EngineResult;
use crate::repository::OperatorGroupRepository;
use rusqlite::Connection;

pub trait OperatorDirectory: Send + Sync {
    /// 在调用方事务内判断 operator 是否可操作 machine
    fn can_operate(&self, conn: &Connection, operator_id: &str, machine: &Machine) -> EngineResult<bool>;
}

/// 不做限制
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAllDirectory;

impl OperatorDirectory for AllowAllDirectory {
    fn can_operate(&self, _conn: &Connection, _operator_id: &str, _machine: &Machine) -> EngineResult<bool> {
        Ok(true)
    }
}

/// 按 operator_group_member 表校验
///
/// 未分组的机台任何操作员可操作；分组机台要求操作员属于该组
#[derive(Debug, Default, Clone, Copy)]
pub struct GroupMembershipDirectory;

impl OperatorDirectory for GroupMembershipDirectory {
    fn can_operate(&self, conn: &Connection, operator_id: &str, machine: &Machine) -> EngineResult<bool> {
        match &machine.group_id {
            None => Ok(true),
            Some(group_id) => Ok(OperatorGroupRepository::is_member_in(conn, operator_id, group_id)?),
        }
    }
}
