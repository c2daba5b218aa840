pub mod common; // 时间格式化等公共函数
pub mod config; // 默认配置与校验
pub mod error; // 错误类型
pub mod files; // 键值存储、导出文件
pub mod logger; // 日志初始化
pub mod models; // 访问记录与接口响应的数据结构
pub mod network; // IP、地理位置查询与服务端上报
pub mod tracker; // 访客记录器
pub mod visit_log; // 有上限的访问日志
