//! Python trainer bridge.
//!
//! The networks and the MNIST loader live in Python modules (`network`,
//! `network2`, `mnist_loader`). The bridge keeps one interpreter alive for the
//! whole run and talks to it over stdin/stdout, one JSON object per line.
//! Anything the Python side prints while training goes to stderr so the
//! protocol stream stays clean.

use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use tracing::{debug, info, warn};

use crate::dataset::{Dataset, DatasetLoader, DatasetTriple, Split};
use crate::error::TrainerError;
use crate::training::metrics::MonitoringFlags;
use crate::training::trainer::{
    Evaluate, MonitoredHistory, MonitoredRequest, MonitoredTrainer, SaveModel, StepTrainer,
    Trainer,
};

/// Server loop run by the interpreter. Requests and replies are single JSON lines.
const BRIDGE_SCRIPT: &str = r#"
import json, sys
proto = sys.stdout
sys.stdout = sys.stderr
import mnist_loader

state = {}

def classes(data):
    label = data[0][1]
    if hasattr(label, "__len__"):
        return len(label)
    return int(max(int(y) for _, y in data)) + 1

def describe(split, data):
    return {"split": split, "len": len(data), "input_dim": len(data[0][0]), "classes": classes(data)}

def handle(req):
    op = req["op"]
    if op == "load":
        tr, va, te = mnist_loader.load_data_wrapper()
        state["data"] = {"training": list(tr), "validation": list(va), "test": list(te)}
        return {"datasets": {k: describe(k, v) for k, v in state["data"].items()}}
    if op == "init":
        if req["module"] == "network2":
            import network2
            cost = network2.CrossEntropyCost if req["cost"] == "cross_entropy" else network2.QuadraticCost
            state["net"] = network2.Network(req["sizes"], cost=cost)
        else:
            import network
            state["net"] = network.Network(req["sizes"])
        return {}
    net = state["net"]
    data = state["data"]
    if op == "train_epoch":
        net.SGD(data["training"], 1, req["mini_batch_size"], req["learning_rate"])
        return {}
    if op == "evaluate":
        split = req["split"]
        if hasattr(net, "accuracy"):
            correct = net.accuracy(data[split], convert=(split == "training"))
        elif split == "training":
            raise ValueError("network cannot score one-hot training labels")
        else:
            correct = net.evaluate(data[split])
        return {"correct": int(correct)}
    if op == "train_monitored":
        m = req["monitor"]
        ec, ea, tc, ta = net.SGD(
            data["training"], req["epochs"], req["mini_batch_size"], req["learning_rate"],
            lmbda=req.get("lambda") or 0.0,
            evaluation_data=data[req["evaluation_split"]],
            monitor_evaluation_cost=m["evaluation_cost"],
            monitor_evaluation_accuracy=m["evaluation_accuracy"],
            monitor_training_cost=m["training_cost"],
            monitor_training_accuracy=m["training_accuracy"])
        return {"history": {
            "evaluation_cost": [float(v) for v in ec],
            "evaluation_accuracy": [float(v) for v in ea],
            "training_cost": [float(v) for v in tc],
            "training_accuracy": [float(v) for v in ta]}}
    if op == "save":
        net.save(req["path"])
        return {}
    raise ValueError("unknown op " + op)

for line in sys.stdin:
    line = line.strip()
    if not line:
        continue
    try:
        reply = handle(json.loads(line))
        reply["ok"] = True
    except Exception as e:
        reply = {"ok": False, "error": "%s: %s" % (type(e).__name__, e)}
    proto.write(json.dumps(reply) + "\n")
    proto.flush()
"#;

/// Which Python network module backs the trainer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkModule {
    /// Plain SGD network. Step training only, cannot save.
    Network,
    /// Regularized network with built-in monitoring and JSON save.
    Network2,
}

impl NetworkModule {
    pub fn supports_monitoring(self) -> bool {
        matches!(self, NetworkModule::Network2)
    }
}

/// Cost function for `network2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostFunction {
    #[default]
    CrossEntropy,
    Quadratic,
}

/// How to launch the Python side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Interpreter executable.
    pub python: PathBuf,
    /// Directory holding `mnist_loader.py` and the network modules. The loader
    /// resolves the data file relative to it.
    pub workdir: PathBuf,
    pub network: NetworkModule,
    pub layer_sizes: Vec<usize>,
    #[serde(default)]
    pub cost: CostFunction,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            python: PathBuf::from("python3"),
            workdir: PathBuf::from("src"),
            network: NetworkModule::Network,
            layer_sizes: vec![784, 30, 10],
            cost: CostFunction::CrossEntropy,
        }
    }
}

impl BridgeConfig {
    pub fn with_network(mut self, network: NetworkModule) -> Self {
        self.network = network;
        self
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Request<'a> {
    Load,
    Init {
        module: NetworkModule,
        sizes: &'a [usize],
        cost: CostFunction,
    },
    TrainEpoch {
        mini_batch_size: usize,
        learning_rate: f64,
    },
    Evaluate {
        split: Split,
    },
    TrainMonitored {
        epochs: usize,
        mini_batch_size: usize,
        learning_rate: f64,
        lambda: Option<f64>,
        evaluation_split: Split,
        monitor: MonitoringFlags,
    },
    Save {
        path: &'a Path,
    },
}

impl Request<'_> {
    fn op(&self) -> &'static str {
        match self {
            Request::Load => "load",
            Request::Init { .. } => "init",
            Request::TrainEpoch { .. } => "train_epoch",
            Request::Evaluate { .. } => "evaluate",
            Request::TrainMonitored { .. } => "train_monitored",
            Request::Save { .. } => "save",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct Response {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    datasets: Option<DatasetTriple>,
    #[serde(default)]
    correct: Option<u64>,
    #[serde(default)]
    history: Option<MonitoredHistory>,
}

/// A trainer living in a child Python process.
pub struct PythonBridge {
    config: BridgeConfig,
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    network_ready: bool,
}

impl PythonBridge {
    /// Launch the interpreter described by `config`.
    pub fn spawn(config: BridgeConfig) -> Result<Self, TrainerError> {
        let mut command = Command::new(&config.python);
        command
            .args(["-u", "-c", BRIDGE_SCRIPT])
            .current_dir(&config.workdir);
        info!(
            python = %config.python.display(),
            workdir = %config.workdir.display(),
            network = ?config.network,
            "Starting Python trainer"
        );
        Self::from_command(command, config)
    }

    /// Attach to any process speaking the bridge protocol.
    pub fn from_command(mut command: Command, config: BridgeConfig) -> Result<Self, TrainerError> {
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        let mut child = command.spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TrainerError::protocol("trainer stdin was not captured"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TrainerError::protocol("trainer stdout was not captured"))?;
        Ok(Self {
            config,
            child,
            stdin,
            stdout: BufReader::new(stdout),
            network_ready: false,
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    fn call(&mut self, request: &Request<'_>) -> Result<Response, TrainerError> {
        let line = serde_json::to_string(request)
            .map_err(|e| TrainerError::protocol(format!("cannot encode request: {e}")))?;
        debug!(op = request.op(), "Sending trainer request");
        writeln!(self.stdin, "{line}")?;
        self.stdin.flush()?;

        let mut reply = String::new();
        if self.stdout.read_line(&mut reply)? == 0 {
            return Err(TrainerError::protocol(format!(
                "trainer process exited during '{}'",
                request.op()
            )));
        }
        let response: Response = serde_json::from_str(reply.trim())
            .map_err(|e| TrainerError::protocol(format!("invalid reply to '{}': {e}", request.op())))?;
        if !response.ok {
            return Err(TrainerError::remote(
                response
                    .error
                    .unwrap_or_else(|| format!("'{}' failed without a message", request.op())),
            ));
        }
        Ok(response)
    }

    /// Build the network on first use.
    fn ensure_network(&mut self) -> Result<(), TrainerError> {
        if self.network_ready {
            return Ok(());
        }
        let sizes = self.config.layer_sizes.clone();
        self.call(&Request::Init {
            module: self.config.network,
            sizes: &sizes,
            cost: self.config.cost,
        })?;
        self.network_ready = true;
        Ok(())
    }
}

impl DatasetLoader for PythonBridge {
    fn load(&mut self) -> Result<DatasetTriple, TrainerError> {
        let response = self.call(&Request::Load)?;
        let datasets = response
            .datasets
            .ok_or_else(|| TrainerError::protocol("load reply carried no datasets"))?;
        info!(
            training = datasets.training.len,
            validation = datasets.validation.len,
            test = datasets.test.len,
            "Loaded datasets"
        );
        Ok(datasets)
    }
}

impl Evaluate for PythonBridge {
    fn correct_count(&mut self, dataset: &Dataset) -> Result<u64, TrainerError> {
        self.ensure_network()?;
        let response = self.call(&Request::Evaluate {
            split: dataset.split,
        })?;
        response
            .correct
            .ok_or_else(|| TrainerError::protocol("evaluate reply carried no count"))
    }
}

impl StepTrainer for PythonBridge {
    fn train_epoch(
        &mut self,
        training: &Dataset,
        mini_batch_size: usize,
        learning_rate: f64,
    ) -> Result<(), TrainerError> {
        if training.split != Split::Training {
            return Err(TrainerError::Unsupported(format!(
                "the Python trainer only steps over its training split, not {}",
                training.split
            )));
        }
        self.ensure_network()?;
        self.call(&Request::TrainEpoch {
            mini_batch_size,
            learning_rate,
        })?;
        Ok(())
    }
}

impl MonitoredTrainer for PythonBridge {
    fn train_monitored(
        &mut self,
        request: &MonitoredRequest<'_>,
    ) -> Result<MonitoredHistory, TrainerError> {
        self.ensure_network()?;
        let hp = request.hyperparameters;
        let response = self.call(&Request::TrainMonitored {
            epochs: hp.epochs,
            mini_batch_size: hp.mini_batch_size,
            learning_rate: hp.learning_rate,
            lambda: hp.lambda,
            evaluation_split: request.evaluation.split,
            monitor: request.monitoring,
        })?;
        response
            .history
            .ok_or_else(|| TrainerError::protocol("train_monitored reply carried no history"))
    }
}

impl SaveModel for PythonBridge {
    fn save(&mut self, path: &Path) -> Result<(), TrainerError> {
        if !self.config.network.supports_monitoring() {
            return Err(TrainerError::Unsupported(
                "the plain network module cannot save its parameters".to_string(),
            ));
        }
        // The interpreter runs in `workdir`, so hand it an absolute path.
        let target = if path.is_relative() {
            std::env::current_dir()?.join(path)
        } else {
            path.to_path_buf()
        };
        self.ensure_network()?;
        self.call(&Request::Save { path: &target })?;
        Ok(())
    }
}

impl Trainer for PythonBridge {
    fn as_step(&mut self) -> Option<&mut dyn StepTrainer> {
        Some(self)
    }

    fn as_monitored(&mut self) -> Option<&mut dyn MonitoredTrainer> {
        if self.config.network.supports_monitoring() {
            Some(self)
        } else {
            None
        }
    }
}

impl Drop for PythonBridge {
    fn drop(&mut self) {
        if let Err(e) = self.child.kill() {
            debug!(error = %e, "Trainer process already gone");
        }
        match self.child.wait() {
            Ok(status) => debug!(%status, "Trainer process stopped"),
            Err(e) => warn!(error = %e, "Failed to reap trainer process"),
        }
    }
}

impl std::fmt::Debug for PythonBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PythonBridge")
            .field("config", &self.config)
            .field("pid", &self.child.id())
            .field("network_ready", &self.network_ready)
            .finish()
    }
}
