use std::collections::HashMap;
use tracing::{debug, error, info};

use crate::{LayoutError, Result};

/// Elements the layouter and its demo pipeline cannot run without
const REQUIRED_ELEMENTS: &[&str] = &["compositor", "videoconvert", "videotestsrc"];

/// Elements used by the demo and tests when present
const OPTIONAL_ELEMENTS: &[&str] = &["autovideosink", "fakesink", "capsfilter", "videoscale"];

/// Element availability of the running GStreamer installation
#[derive(Debug, Clone)]
pub struct GstCapabilities {
    pub has_display_sink: bool,
    pub available_elements: HashMap<String, bool>,
}

impl GstCapabilities {
    /// Check if a specific element is available
    pub fn has_element(&self, element: &str) -> bool {
        self.available_elements.get(element).copied().unwrap_or(false)
    }
}

/// Initialize GStreamer and check the element factories we depend on
pub fn initialize() -> Result<GstCapabilities> {
    info!("Initializing GStreamer");

    gst::init().map_err(|e| {
        error!("Failed to initialize GStreamer: {}", e);
        LayoutError::Config(format!("GStreamer initialization failed: {}", e))
    })?;

    let (major, minor, micro, nano) = gst::version();
    info!("GStreamer version: {}.{}.{}.{}", major, minor, micro, nano);

    if let Ok(plugin_path) = std::env::var("GST_PLUGIN_PATH") {
        info!("Using custom GST_PLUGIN_PATH: {}", plugin_path);
    }

    let capabilities = discover_plugins()?;
    info!("Display sink available: {}", capabilities.has_display_sink);

    Ok(capabilities)
}

/// Look up every known element factory, failing on a missing required one
pub fn discover_plugins() -> Result<GstCapabilities> {
    let mut available_elements = HashMap::new();
    let mut missing_required = Vec::new();

    for element in REQUIRED_ELEMENTS {
        let found = gst::ElementFactory::find(element).is_some();
        if found {
            debug!("Found required element: {}", element);
        } else {
            error!("Missing required element: {}", element);
            missing_required.push(*element);
        }
        available_elements.insert(element.to_string(), found);
    }

    if !missing_required.is_empty() {
        return Err(LayoutError::Config(format!(
            "Missing required GStreamer elements: {:?}",
            missing_required
        )));
    }

    for element in OPTIONAL_ELEMENTS {
        let found = gst::ElementFactory::find(element).is_some();
        if !found {
            debug!("Optional element not found: {}", element);
        }
        available_elements.insert(element.to_string(), found);
    }

    Ok(GstCapabilities {
        has_display_sink: available_elements
            .get("autovideosink")
            .copied()
            .unwrap_or(false),
        available_elements,
    })
}

/// Print plugin availability (for the --check-plugins flag)
pub fn print_plugin_info(capabilities: &GstCapabilities) {
    println!("\nGStreamer Plugin Discovery Report");
    println!("==================================");

    let (major, minor, micro, nano) = gst::version();
    println!("\nGStreamer Version: {}.{}.{}.{}", major, minor, micro, nano);

    println!("\nRequired Elements:");
    for element in REQUIRED_ELEMENTS {
        let status = if capabilities.has_element(element) { "✓" } else { "✗" };
        println!("  {} {}", status, element);
    }

    println!("\nOptional Elements:");
    for element in OPTIONAL_ELEMENTS {
        let status = if capabilities.has_element(element) { "✓" } else { "✗" };
        println!("  {} {}", status, element);
    }

    let registry = gst::Registry::get();
    println!("\nRegistry Statistics:");
    println!("  Total Plugins: {}", registry.plugins().len());
}
