use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use filter_engine::demo;
use filter_engine::model::{ModelMetadata, ModelRegistry};
use filter_engine::{FilterConfig, FilterError, FilterService, Operator};

const CONFIG_FILE: &str = "filter_config.json";

/// 创建过滤服务，优先使用JSON配置，失败时使用默认配置
fn create_service() -> Result<FilterService<ModelRegistry>> {
    match FilterConfig::from_json_file(CONFIG_FILE) {
        Ok(config) => {
            println!("✅ 成功从JSON配置文件加载: {}", CONFIG_FILE);
            for (entity, table) in &config.table_mapping.mappings {
                println!("  {} -> {}", entity, table);
            }
            FilterService::new(demo::registry(), config).context("配置无效")
        }
        Err(e) => {
            tracing::warn!(error = %e, "falling back to default filter config");
            println!("⚠️ 无法加载JSON配置文件 ({}), 使用默认配置", e);
            Ok(FilterService::with_defaults(demo::registry()))
        }
    }
}

fn print_help() {
    println!("输入 JSON 过滤条件, 编译为 SQL. 命令:");
    println!("  :entity <名称>  切换目标实体");
    println!("  :count          切换 COUNT 查询");
    println!("  :json           显示上一次过滤条件的规范化 JSON");
    println!("  :help           显示帮助");
    println!("  :quit           退出");
    let tokens: Vec<_> = Operator::all_tokens().collect();
    println!("可用运算符: {}", tokens.join(" "));
}

/// 打印错误及其原因链
fn print_error(err: &FilterError) {
    println!("✗ {}", err);
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        println!("  原因: {}", cause);
        source = cause.source();
    }
}

struct Session {
    service: FilterService<ModelRegistry>,
    entity: String,
    count: bool,
    last_json: Option<String>,
}

impl Session {
    fn handle_command(&mut self, command: &str) -> bool {
        let mut parts = command.split_whitespace();
        match parts.next() {
            Some(":quit") | Some(":q") => return false,
            Some(":help") => print_help(),
            Some(":count") => {
                self.count = !self.count;
                println!("COUNT 查询: {}", if self.count { "开" } else { "关" });
            }
            Some(":json") => match &self.last_json {
                Some(json) => println!("{}", json),
                None => println!("还没有过滤条件"),
            },
            Some(":entity") => match parts.next() {
                Some(name) if self.service.metadata().entity(name).is_some() => {
                    self.entity = name.to_string();
                    println!("目标实体: {}", self.entity);
                }
                Some(name) => println!("✗ 未知实体: {}", name),
                None => println!("目标实体: {}", self.entity),
            },
            _ => println!("未知命令, 输入 :help 查看帮助"),
        }
        true
    }

    fn compile(&mut self, input: &str) -> Result<(), FilterError> {
        let node = self.service.parse(input)?;
        let compiled = self.service.compile(&node, &self.entity)?;
        self.last_json = Some(self.service.to_json(&node)?);

        let mapping = self.service.table_mapping();
        let sql = if self.count {
            compiled.to_count_sql(mapping)
        } else {
            compiled.to_sql(mapping)
        };
        println!("✅ 成功编译为 SQL ({} 个连接)", compiled.joins.len());
        println!("{}", sql);
        Ok(())
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "filter_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("--- Filter Engine: JSON 过滤条件到 SQL 编译器 ---");
    let mut session = Session {
        service: create_service()?,
        entity: "Task".to_string(),
        count: false,
        last_json: None,
    };
    let config = session.service.config();
    println!(
        "区域设置: {}, 时区: {}, 通配符: {}",
        config.formatting_culture, config.time_zone, config.like_wildcard
    );
    print_help();

    let mut editor = DefaultEditor::new()?;
    loop {
        match editor.readline(&format!("{}> ", session.entity)) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                editor.add_history_entry(line)?;

                if line.starts_with(':') {
                    if !session.handle_command(line) {
                        break;
                    }
                } else if let Err(e) = session.compile(line) {
                    print_error(&e);
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }

    println!("再见!");
    Ok(())
}
