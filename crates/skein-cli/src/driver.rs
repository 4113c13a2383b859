/// Script runner that wires the interpreter to the terminal

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde_json::Value as JsonValue;
use skein_ast::Node;
use skein_eval::{Error, Interpreter, InterpreterOptions, IrqSleep, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdin};
use tokio::sync::Mutex;

use crate::error::{CliError, Result};

/// Options for running a script
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Script file: a JSON array of syntax tree nodes
    pub input: PathBuf,
    /// Run without ever suspending
    pub sync: bool,
    pub max_step: Option<u64>,
    pub irq_rate: Option<f64>,
    /// Milliseconds to sleep at each interrupt point
    pub irq_sleep: Option<f64>,
    pub abort_on_error: bool,
    /// JSON object whose entries become root constants
    pub consts: Option<PathBuf>,
}

impl RunOptions {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            ..Default::default()
        }
    }

    pub fn sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    pub fn max_step(mut self, max_step: Option<u64>) -> Self {
        self.max_step = max_step;
        self
    }

    pub fn irq_rate(mut self, rate: Option<f64>) -> Self {
        self.irq_rate = rate;
        self
    }

    pub fn irq_sleep(mut self, ms: Option<f64>) -> Self {
        self.irq_sleep = ms;
        self
    }

    pub fn abort_on_error(mut self, abort_on_error: bool) -> Self {
        self.abort_on_error = abort_on_error;
        self
    }

    pub fn consts(mut self, consts: Option<PathBuf>) -> Self {
        self.consts = consts;
        self
    }
}

/// Result of a finished run
#[derive(Debug)]
pub struct RunOutput {
    /// Value of the last top-level statement
    pub value: Option<Value>,
    pub steps: u64,
}

fn read_file(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(CliError::FileNotFound(path.to_path_buf()));
    }
    Ok(std::fs::read_to_string(path)?)
}

/// Load a script saved as a JSON array of nodes.
pub fn load_script(path: &Path) -> Result<Vec<Node>> {
    let source = read_file(path)?;
    serde_json::from_str(&source).map_err(|e| CliError::parse(path, e.to_string()))
}

/// Load root constants from a JSON object.
pub fn load_consts(path: &Path) -> Result<HashMap<String, Value>> {
    let source = read_file(path)?;
    let json: JsonValue = serde_json::from_str(&source).map_err(|e| CliError::consts(path, e.to_string()))?;
    let JsonValue::Object(entries) = json else {
        return Err(CliError::consts(path, "expected a JSON object"));
    };
    Ok(entries
        .into_iter()
        .map(|(name, value)| (name, Value::from_json_value(value)))
        .collect())
}

/// Metadata blocks of a script file, as a JSON array of `{ name, value }`.
pub fn load_metadata(path: &Path) -> Result<JsonValue> {
    let script = load_script(path)?;
    let Some(meta) = Interpreter::collect_metadata(&script)? else {
        return Ok(JsonValue::Array(vec![]));
    };
    let mut blocks: Vec<(Option<String>, JsonValue)> = meta.into_iter().collect();
    blocks.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(JsonValue::Array(
        blocks
            .into_iter()
            .map(|(name, value)| serde_json::json!({ "name": name, "value": value }))
            .collect(),
    ))
}

async fn read_line(stdin: Rc<Mutex<BufReader<Stdin>>>, prompt: String) -> String {
    let mut stdout = tokio::io::stdout();
    if stdout.write_all(prompt.as_bytes()).await.is_ok() {
        let _ = stdout.flush().await;
    }
    let mut line = String::new();
    if let Err(e) = stdin.lock().await.read_line(&mut line).await {
        tracing::warn!(error = %e, "failed to read input");
    }
    line.trim_end_matches(['\n', '\r']).to_string()
}

/// Runs one script file
pub struct Runner {
    options: RunOptions,
}

impl Runner {
    pub fn new(options: RunOptions) -> Self {
        Self { options }
    }

    fn interpreter_options(
        &self,
        output: impl Fn(Value) + 'static,
        failure: Rc<RefCell<Option<Error>>>,
    ) -> InterpreterOptions {
        let stdin = Rc::new(Mutex::new(BufReader::new(tokio::io::stdin())));
        let mut opts = InterpreterOptions::new()
            .output(output)
            .input(move |prompt| read_line(stdin.clone(), prompt))
            .error(move |e| {
                failure.borrow_mut().get_or_insert(e);
            })
            .abort_on_error(self.options.abort_on_error);

        if let Some(max_step) = self.options.max_step {
            opts = opts.max_step(max_step);
        }
        if let Some(rate) = self.options.irq_rate {
            opts = opts.irq_rate(rate);
        }
        if let Some(ms) = self.options.irq_sleep {
            opts = opts.irq_sleep(IrqSleep::Millis(ms));
        }
        opts
    }

    /// Run the script, handing everything it prints to `output`.
    pub async fn run(&self, output: impl Fn(Value) + 'static) -> Result<RunOutput> {
        let script = load_script(&self.options.input)?;
        let consts = match &self.options.consts {
            Some(path) => load_consts(path)?,
            None => HashMap::new(),
        };

        let failure = Rc::new(RefCell::new(None));
        let interp = Interpreter::new(consts, self.interpreter_options(output, failure.clone()))?;
        interp.register_abort_handler(Rc::new(|| tracing::info!("script aborted")));

        tracing::debug!(
            input = %self.options.input.display(),
            nodes = script.len(),
            sync = self.options.sync,
            "running script"
        );
        let value = if self.options.sync {
            interp.exec_sync(&script)?
        } else {
            interp.exec(&script).await?
        };

        let failed = failure.borrow_mut().take();
        if let Some(e) = failed {
            return Err(e.into());
        }
        Ok(RunOutput {
            value,
            steps: interp.step_count(),
        })
    }
}
