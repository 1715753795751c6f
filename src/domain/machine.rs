// ==========================================
// 生产台账引擎 - 机台与模具领域模型
// ==========================================
// 对齐: machine / matrix 表
// 红线: 状态与操作员只能由状态转换引擎和会话管理器修改
// ==========================================

use crate::domain::types::{MachineStatus, MatrixStatus};
use serde::{Deserialize, Serialize};

// ==========================================
// Machine - 机台
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    pub machine_id: String,       // 机台ID
    pub company_id: String,       // 所属公司
    pub group_id: Option<String>, // 机台分组 (可选)
    pub code: String,             // 机台编码/名称

    pub matrix_count: i32,               // 模具数量 (0 = 无子模具)
    pub nominal_cycle_seconds: f64,      // 标准节拍 (秒)
    pub status: MachineStatus,           // 当前状态
    pub current_operator_id: Option<String>, // 当前操作员
}

impl Machine {
    /// 模具序号是否在 1..=N 范围内
    pub fn accepts_matrix_number(&self, matrix_number: i32) -> bool {
        matrix_number >= 1 && matrix_number <= self.matrix_count
    }
}

// ==========================================
// NewMachine - 机台登记参数
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMachine {
    pub company_id: String,
    pub group_id: Option<String>,
    pub code: String,
    pub matrix_count: i32,
    pub nominal_cycle_seconds: f64,
}

// ==========================================
// Matrix - 模具 (机台的独立计时子单元)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    pub matrix_id: String,     // 模具ID
    pub machine_id: String,    // 所属机台
    pub matrix_number: i32,    // 序号 1..N
    pub status: MatrixStatus,  // 当前状态
}
