// ==========================================
// 生产台账引擎 - 基础资料 API
// ==========================================
// 职责: 机台/模具登记、停机原因维护、操作员分组成员维护
// 供外部初始化流程与管理端调用，不在台账热路径上
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::api::production_api::require_id;
use crate::domain::machine::{Machine, Matrix, NewMachine};
use crate::domain::stop_reason::StopReason;
use crate::engine::context::LedgerContext;
use crate::engine::registry::ResourceRegistry;
use crate::repository::error::RepositoryError;
use crate::repository::{OperatorGroupRepository, StopReasonRepository};

pub struct ResourceApi {
    registry: ResourceRegistry,
    stop_reason_repo: StopReasonRepository,
    operator_group_repo: OperatorGroupRepository,
}

impl ResourceApi {
    pub fn new(ctx: LedgerContext) -> Self {
        Self {
            stop_reason_repo: StopReasonRepository::new(ctx.conn.clone()),
            operator_group_repo: OperatorGroupRepository::new(ctx.conn.clone()),
            registry: ResourceRegistry::new(ctx),
        }
    }

    // ==========================================
    // 机台 / 模具
    // ==========================================

    pub fn register_machine(&self, new_machine: &NewMachine) -> ApiResult<Machine> {
        require_id("company_id", &new_machine.company_id)?;
        require_id("code", &new_machine.code)?;
        if new_machine.matrix_count < 0 {
            return Err(ApiError::InvalidInput(format!(
                "模具数量不能为负: {}",
                new_machine.matrix_count
            )));
        }
        if !new_machine.nominal_cycle_seconds.is_finite() || new_machine.nominal_cycle_seconds < 0.0 {
            return Err(ApiError::InvalidInput(format!(
                "标准节拍无效: {}",
                new_machine.nominal_cycle_seconds
            )));
        }
        Ok(self.registry.register_machine(new_machine)?)
    }

    pub fn get_machine(&self, machine_id: &str) -> ApiResult<Machine> {
        Ok(self.registry.get_machine(require_id("machine_id", machine_id)?)?)
    }

    pub fn list_matrices(&self, machine_id: &str) -> ApiResult<Vec<Matrix>> {
        Ok(self.registry.list_matrices(require_id("machine_id", machine_id)?)?)
    }

    /// 调整模具数量（机台有进行中会话时拒绝）
    pub fn set_matrix_count(&self, machine_id: &str, matrix_count: i32, actor: &str) -> ApiResult<Vec<Matrix>> {
        let machine_id = require_id("machine_id", machine_id)?;
        let actor = require_id("actor", actor)?;
        if matrix_count < 0 {
            return Err(ApiError::InvalidInput(format!("模具数量不能为负: {}", matrix_count)));
        }
        Ok(self.registry.set_matrix_count(machine_id, matrix_count, actor)?)
    }

    // ==========================================
    // 停机原因
    // ==========================================

    /// 公司初始化: 预置 "班次结束" 系统原因（幂等）
    pub fn provision_company(&self, company_id: &str) -> ApiResult<StopReason> {
        let company_id = require_id("company_id", company_id)?;
        Ok(self.stop_reason_repo.ensure_shift_ended_reason(company_id)?)
    }

    pub fn create_stop_reason(
        &self,
        company_id: &str,
        name: &str,
        category: &str,
        exclude_from_pareto: bool,
    ) -> ApiResult<StopReason> {
        let company_id = require_id("company_id", company_id)?;
        let name = require_id("name", name)?;
        let category = require_id("category", category)?;

        match self
            .stop_reason_repo
            .create(company_id, name, category, exclude_from_pareto)
        {
            Ok(reason) => Ok(reason),
            Err(RepositoryError::UniqueConstraintViolation(_)) => Err(ApiError::InvalidInput(format!(
                "停机原因已存在: company={} name={}",
                company_id, name
            ))),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list_stop_reasons(&self, company_id: &str) -> ApiResult<Vec<StopReason>> {
        let company_id = require_id("company_id", company_id)?;
        Ok(self.stop_reason_repo.list_by_company(company_id)?)
    }

    // ==========================================
    // 操作员分组
    // ==========================================

    pub fn add_operator_to_group(&self, operator_id: &str, group_id: &str) -> ApiResult<()> {
        let operator_id = require_id("operator_id", operator_id)?;
        let group_id = require_id("group_id", group_id)?;
        Ok(self.operator_group_repo.add_member(operator_id, group_id)?)
    }

    pub fn remove_operator_from_group(&self, operator_id: &str, group_id: &str) -> ApiResult<bool> {
        let operator_id = require_id("operator_id", operator_id)?;
        let group_id = require_id("group_id", group_id)?;
        Ok(self.operator_group_repo.remove_member(operator_id, group_id)?)
    }
}
