use std::{
    env,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
};

#[cfg(feature = "tch-backend")]
use tch::Device;

use crate::{
    error::ServiceError,
    labels::ClassLabels,
    preprocess::{Normalization, PreprocessConfig, TensorLayout},
};

const DEFAULT_PORT: u16 = 5001;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub model_path: PathBuf,
    pub class_names: Option<String>,
    pub class_names_path: Option<PathBuf>,
    pub preprocess: PreprocessConfig,
    pub apply_softmax: bool,
    pub max_body_bytes: usize,
    #[cfg(feature = "tch-backend")]
    pub device: Device,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            model_path: PathBuf::from("models/disease_model.pt"),
            class_names: None,
            class_names_path: None,
            preprocess: PreprocessConfig::default(),
            apply_softmax: false,
            max_body_bytes: 16 * 1024 * 1024,
            #[cfg(feature = "tch-backend")]
            device: Device::Cpu,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let listen_addr = env::var("SERVER_ADDR")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.listen_addr);

        let model_path = env::var("MODEL_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.model_path);

        let class_names = env::var("CLASS_NAMES").ok();
        let class_names_path = env::var("CLASS_NAMES_PATH").ok().map(PathBuf::from);

        let (width, height) = env::var("IMAGE_SIZE")
            .ok()
            .and_then(|v| parse_image_size(&v))
            .unwrap_or((defaults.preprocess.width, defaults.preprocess.height));
        let normalization = env::var("NORMALIZATION")
            .ok()
            .and_then(|v| Normalization::parse(&v))
            .unwrap_or(defaults.preprocess.normalization);
        let layout = env::var("INPUT_LAYOUT")
            .ok()
            .and_then(|v| TensorLayout::parse(&v))
            .unwrap_or(defaults.preprocess.layout);

        let apply_softmax = env::var("APPLY_SOFTMAX")
            .ok()
            .and_then(|v| parse_bool(&v))
            .unwrap_or(defaults.apply_softmax);
        let max_body_bytes = env::var("MAX_BODY_BYTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_body_bytes);

        #[cfg(feature = "tch-backend")]
        let device = {
            let raw = env::var("DEVICE").unwrap_or_else(|_| "cpu".into());
            parse_device(&raw)
        };

        Ok(Self {
            listen_addr,
            model_path,
            class_names,
            class_names_path,
            preprocess: PreprocessConfig {
                width,
                height,
                normalization,
                layout,
            },
            apply_softmax,
            max_body_bytes,
            #[cfg(feature = "tch-backend")]
            device,
        })
    }

    /// Labels file wins over the inline list, which wins over the built-in one.
    pub fn class_labels(&self) -> Result<ClassLabels, ServiceError> {
        if let Some(path) = self.class_names_path.as_ref() {
            return ClassLabels::load_from_path(path);
        }
        match self.class_names.as_deref() {
            Some(raw) if !raw.trim().is_empty() => Ok(ClassLabels::from_csv(raw)),
            _ => Ok(ClassLabels::default()),
        }
    }
}

/// Accepts `224` or `224x160` (width x height).
fn parse_image_size(raw: &str) -> Option<(u32, u32)> {
    let raw = raw.trim().to_ascii_lowercase();
    let (width, height) = match raw.split_once('x') {
        Some((w, h)) => (w.trim().parse().ok()?, h.trim().parse().ok()?),
        None => {
            let side: u32 = raw.parse().ok()?;
            (side, side)
        }
    };
    (width > 0 && height > 0).then_some((width, height))
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(feature = "tch-backend")]
fn parse_device(raw: &str) -> Device {
    let lower = raw.to_lowercase();
    if lower.starts_with("cuda") {
        let idx = lower
            .split(':')
            .nth(1)
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(0);
        if tch::Cuda::is_available() {
            Device::Cuda(idx)
        } else {
            tracing::warn!(requested = %raw, "CUDA unavailable, falling back to CPU");
            Device::Cpu
        }
    } else {
        Device::Cpu
    }
}
