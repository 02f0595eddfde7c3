use std::fmt;

/// 应用程序错误类型
#[derive(Debug)]
pub enum AppError {
    /// 浏览器相关错误
    Browser(BrowserError),
    /// 区域/元素定位错误
    Locate(LocateError),
    /// 页面交互错误
    Interaction(InteractionError),
    /// 会话状态机错误
    Session(SessionError),
    /// 生成生命周期错误
    Generation(GenerationError),
    /// 文件操作错误
    File(FileError),
    /// 配置错误
    Config(ConfigError),
    /// 其他错误（用于包装第三方库错误）
    Other(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Browser(e) => write!(f, "浏览器错误: {}", e),
            AppError::Locate(e) => write!(f, "定位错误: {}", e),
            AppError::Interaction(e) => write!(f, "交互错误: {}", e),
            AppError::Session(e) => write!(f, "会话错误: {}", e),
            AppError::Generation(e) => write!(f, "生成错误: {}", e),
            AppError::File(e) => write!(f, "文件错误: {}", e),
            AppError::Config(e) => write!(f, "配置错误: {}", e),
            AppError::Other(msg) => write!(f, "错误: {}", msg),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Browser(e) => Some(e),
            AppError::Locate(e) => Some(e),
            AppError::Interaction(e) => Some(e),
            AppError::Session(e) => Some(e),
            AppError::Generation(e) => Some(e),
            AppError::File(e) => Some(e),
            AppError::Config(e) => Some(e),
            AppError::Other(_) => None,
        }
    }
}

/// 浏览器相关错误
#[derive(Debug)]
pub enum BrowserError {
    /// 启动浏览器失败
    LaunchFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 创建页面失败
    PageCreationFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 导航失败
    NavigationFailed {
        url: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 执行脚本失败
    ScriptExecutionFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 浏览器配置失败
    ConfigurationFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for BrowserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrowserError::LaunchFailed { source } => {
                write!(f, "启动浏览器失败: {}", source)
            }
            BrowserError::PageCreationFailed { source } => {
                write!(f, "创建页面失败: {}", source)
            }
            BrowserError::NavigationFailed { url, source } => {
                write!(f, "导航到 {} 失败: {}", url, source)
            }
            BrowserError::ScriptExecutionFailed { source } => {
                write!(f, "执行脚本失败: {}", source)
            }
            BrowserError::ConfigurationFailed { source } => {
                write!(f, "浏览器配置失败: {}", source)
            }
        }
    }
}

impl std::error::Error for BrowserError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BrowserError::LaunchFailed { source }
            | BrowserError::PageCreationFailed { source }
            | BrowserError::NavigationFailed { source, .. }
            | BrowserError::ScriptExecutionFailed { source }
            | BrowserError::ConfigurationFailed { source } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
        }
    }
}

/// 区域/元素定位错误
#[derive(Debug)]
pub enum LocateError {
    /// 在等待时限内未找到标签对应的节点
    NotFound { label: String, waited_ms: u64 },
    /// 找到了标题但没有任何祖先容器满足最小高度
    ContainerMissing { label: String },
}

impl fmt::Display for LocateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocateError::NotFound { label, waited_ms } => {
                write!(f, "未找到区域 '{}' (等待 {}ms)", label, waited_ms)
            }
            LocateError::ContainerMissing { label } => {
                write!(f, "区域 '{}' 只有标题，未找到合格容器", label)
            }
        }
    }
}

impl std::error::Error for LocateError {}

/// 页面交互错误
#[derive(Debug)]
pub enum InteractionError {
    /// 操作或文件选择对话框在时限内未出现
    Timeout { operation: String, timeout_ms: u64 },
    /// 所有回退策略均告失败
    StrategyExhausted { label: String, attempted: usize },
    /// 目标元素不可见
    TargetInvisible { description: String },
}

impl fmt::Display for InteractionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InteractionError::Timeout {
                operation,
                timeout_ms,
            } => {
                write!(f, "操作 '{}' 超时 ({}ms)", operation, timeout_ms)
            }
            InteractionError::StrategyExhausted { label, attempted } => {
                write!(f, "区域 '{}' 的全部 {} 个策略均失败", label, attempted)
            }
            InteractionError::TargetInvisible { description } => {
                write!(f, "目标元素不可见: {}", description)
            }
        }
    }
}

impl std::error::Error for InteractionError {}

/// 会话状态机错误
#[derive(Debug)]
pub enum SessionError {
    /// 在预算内未能到达 Ready 状态
    NotReady { waited_secs: u64 },
    /// 登录表单填写失败
    LoginFailed {
        stage: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::NotReady { waited_secs } => {
                write!(f, "会话在 {}s 内未到达 Ready 状态", waited_secs)
            }
            SessionError::LoginFailed { stage, source } => {
                write!(f, "登录阶段 '{}' 失败: {}", stage, source)
            }
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::LoginFailed { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

/// 生成生命周期错误
#[derive(Debug)]
pub enum GenerationError {
    /// 生成在轮询上限内仍未结束
    TimedOut { cycles: usize, interval_secs: u64 },
    /// 未找到可点击的主操作按钮
    TriggerNotFound,
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationError::TimedOut {
                cycles,
                interval_secs,
            } => {
                write!(
                    f,
                    "生成超时: 轮询 {} 次 (间隔 {}s) 后仍在进行",
                    cycles, interval_secs
                )
            }
            GenerationError::TriggerNotFound => {
                write!(f, "未找到生成按钮候选")
            }
        }
    }
}

impl std::error::Error for GenerationError {}

/// 文件操作错误
#[derive(Debug)]
pub enum FileError {
    /// 文件不存在
    NotFound { path: String },
    /// 读取文件/目录失败
    ReadFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 写入文件失败
    WriteFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 目录不存在
    DirectoryNotFound { path: String },
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileError::NotFound { path } => write!(f, "文件不存在: {}", path),
            FileError::ReadFailed { path, source } => {
                write!(f, "读取失败 ({}): {}", path, source)
            }
            FileError::WriteFailed { path, source } => {
                write!(f, "写入失败 ({}): {}", path, source)
            }
            FileError::DirectoryNotFound { path } => write!(f, "目录不存在: {}", path),
        }
    }
}

impl std::error::Error for FileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FileError::ReadFailed { source, .. } | FileError::WriteFailed { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

/// 配置错误
#[derive(Debug)]
pub enum ConfigError {
    /// 环境变量解析失败
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 必填配置缺失（例如 profile 目录）
    MissingValue { field: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EnvVarParseFailed {
                var_name,
                value,
                expected_type,
            } => {
                write!(
                    f,
                    "环境变量 {} 解析失败: 值 '{}' 无法转换为 {}",
                    var_name, value, expected_type
                )
            }
            ConfigError::MissingValue { field } => {
                write!(f, "缺少必填配置: {}", field)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ========== 从常见错误类型转换 ==========
// 注意：不需要手动实现 From<AppError> for anyhow::Error，
// 因为 anyhow 已经为所有实现了 std::error::Error 的类型提供了自动实现

impl From<chromiumoxide::error::CdpError> for AppError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        AppError::Browser(BrowserError::ScriptExecutionFailed {
            source: Box::new(err),
        })
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Other(format!("JSON解析失败: {}", err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: String::new(),
            source: Box::new(err),
        })
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建区域未找到错误
    pub fn region_not_found(label: impl Into<String>, waited_ms: u64) -> Self {
        AppError::Locate(LocateError::NotFound {
            label: label.into(),
            waited_ms,
        })
    }

    /// 创建交互超时错误
    pub fn interaction_timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        AppError::Interaction(InteractionError::Timeout {
            operation: operation.into(),
            timeout_ms,
        })
    }

    /// 创建策略耗尽错误
    pub fn strategy_exhausted(label: impl Into<String>, attempted: usize) -> Self {
        AppError::Interaction(InteractionError::StrategyExhausted {
            label: label.into(),
            attempted,
        })
    }

    /// 创建会话未就绪错误
    pub fn session_not_ready(waited_secs: u64) -> Self {
        AppError::Session(SessionError::NotReady { waited_secs })
    }

    /// 创建生成超时错误
    pub fn generation_timed_out(cycles: usize, interval_secs: u64) -> Self {
        AppError::Generation(GenerationError::TimedOut {
            cycles,
            interval_secs,
        })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
