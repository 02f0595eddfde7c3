/// 程序配置文件
#[derive(Clone, Debug)]
pub struct Config {
    // --- 浏览器 ---
    /// Chrome 用户数据目录（持久化会话）
    pub user_data_dir: String,
    /// Chrome 可执行文件路径（为空则使用系统默认）
    pub chrome_executable: String,
    /// 目标URL
    pub target_url: String,

    // --- 登录凭据 ---
    pub email: String,
    pub password: String,

    // --- 输入 ---
    /// 图片来源目录，按声明顺序处理
    pub image_folders: Vec<String>,

    // --- 区域定位 ---
    /// 上传区域标签，按声明顺序处理
    pub region_labels: Vec<String>,
    /// 区域容器的最小高度（px）
    pub min_region_height: f64,
    /// 容器祖先回溯的最大跳数
    pub max_ancestor_hops: usize,
    /// 标题可见性等待（毫秒）
    pub header_wait_ms: u64,

    // --- 交互策略 ---
    /// 文件选择对话框的拦截超时（毫秒）
    pub dialog_timeout_ms: u64,
    /// 盲点策略：标题下方的纵向偏移（px）
    pub blind_click_offset: f64,

    // --- 视觉分类器 ---
    /// 主操作按钮区域：视口底部比例阈值（y > height * 该值）
    pub zone_bottom_frac: f64,
    /// 主操作按钮区域：视口右侧比例阈值（x > width * 该值）
    pub zone_right_frac: f64,
    /// 已知的深色背景 RGB 三元组
    pub dark_colors: Vec<(u8, u8, u8)>,
    /// 通用深色判定：所有通道低于该值
    pub dark_channel_max: u8,

    // --- 会话状态机 ---
    /// 登录后等待跳转的时限（秒）
    pub login_wait_secs: u64,
    /// 手动登录兜底的总时限（秒）
    pub manual_login_wait_secs: u64,
    /// 每个会话最多关闭的引导弹窗数
    pub max_modal_dismissals: usize,

    // --- 生成监控 ---
    /// 轮询间隔（秒）
    pub generation_poll_secs: u64,
    /// 最大轮询次数
    pub generation_max_cycles: usize,
    /// 信号宽限窗口（轮询次数）
    pub generation_grace_cycles: usize,

    // --- 批次节奏 ---
    /// 生成前的稳定等待（秒）
    pub settle_before_generate_secs: u64,
    /// 清理后的稳定等待（秒）
    pub settle_after_clear_secs: u64,

    // --- 日志 ---
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user_data_dir: "whisk_profile".to_string(),
            chrome_executable: String::new(),
            target_url: "https://labs.google/fx/tools/whisk/project".to_string(),
            email: String::new(),
            password: String::new(),
            image_folders: vec!["test_images".to_string()],
            region_labels: vec![
                "Subject".to_string(),
                "Scene".to_string(),
                "Style".to_string(),
            ],
            min_region_height: 150.0,
            max_ancestor_hops: 5,
            header_wait_ms: 3000,
            dialog_timeout_ms: 5000,
            blind_click_offset: 110.0,
            zone_bottom_frac: 0.6,
            zone_right_frac: 0.5,
            dark_colors: vec![(0, 0, 0), (32, 33, 36), (31, 31, 31), (26, 26, 26)],
            dark_channel_max: 50,
            login_wait_secs: 15,
            manual_login_wait_secs: 180,
            max_modal_dismissals: 5,
            generation_poll_secs: 2,
            generation_max_cycles: 30,
            generation_grace_cycles: 3,
            settle_before_generate_secs: 12,
            settle_after_clear_secs: 5,
            verbose_logging: false,
            output_log_file: "output.txt".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            user_data_dir: std::env::var("WHISK_USER_DATA_DIR").unwrap_or(default.user_data_dir),
            chrome_executable: std::env::var("WHISK_CHROME_EXECUTABLE")
                .unwrap_or(default.chrome_executable),
            target_url: std::env::var("WHISK_TARGET_URL").unwrap_or(default.target_url),
            email: std::env::var("WHISK_EMAIL").unwrap_or(default.email),
            password: std::env::var("WHISK_PASSWORD").unwrap_or(default.password),
            image_folders: std::env::var("WHISK_IMAGE_FOLDERS")
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(default.image_folders),
            region_labels: default.region_labels,
            min_region_height: std::env::var("WHISK_MIN_REGION_HEIGHT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.min_region_height),
            max_ancestor_hops: default.max_ancestor_hops,
            header_wait_ms: std::env::var("WHISK_HEADER_WAIT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.header_wait_ms),
            dialog_timeout_ms: std::env::var("WHISK_DIALOG_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.dialog_timeout_ms),
            blind_click_offset: default.blind_click_offset,
            zone_bottom_frac: default.zone_bottom_frac,
            zone_right_frac: default.zone_right_frac,
            dark_colors: default.dark_colors,
            dark_channel_max: default.dark_channel_max,
            login_wait_secs: default.login_wait_secs,
            manual_login_wait_secs: std::env::var("WHISK_MANUAL_LOGIN_WAIT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.manual_login_wait_secs),
            max_modal_dismissals: default.max_modal_dismissals,
            generation_poll_secs: std::env::var("WHISK_GENERATION_POLL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.generation_poll_secs),
            generation_max_cycles: std::env::var("WHISK_GENERATION_MAX_CYCLES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.generation_max_cycles),
            generation_grace_cycles: default.generation_grace_cycles,
            settle_before_generate_secs: std::env::var("WHISK_SETTLE_BEFORE_GENERATE_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.settle_before_generate_secs),
            settle_after_clear_secs: std::env::var("WHISK_SETTLE_AFTER_CLEAR_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.settle_after_clear_secs),
            verbose_logging: std::env::var("WHISK_VERBOSE_LOGGING")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.verbose_logging),
            output_log_file: std::env::var("WHISK_OUTPUT_LOG_FILE")
                .unwrap_or(default.output_log_file),
        }
    }
}
