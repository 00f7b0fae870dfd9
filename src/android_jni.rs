//! JNI bindings for the Android app.
//!
//! Each public function here corresponds to a `external fun` declaration
//! in RustBridge.kt. The function names follow JNI naming conventions:
//! Java_<package>_<class>_<method> with dots replaced by underscores.
//!
//! Data crosses the boundary as JSON strings. Failures are logged and
//! surface on the Kotlin side as `null`.

use jni::objects::{JClass, JString};
use jni::sys::{jdouble, jstring};
use jni::JNIEnv;

use crate::dataset;
use crate::error::{NavError, Result};
use crate::hazard::HazardModel;
use crate::instructions::format_distance;

fn read_string(env: &mut JNIEnv, s: &JString) -> Result<String> {
    env.get_string(s)
        .map(String::from)
        .map_err(|e| NavError::InvalidInput(format!("JNI string: {e}")))
}

fn into_java(env: &mut JNIEnv, value: Result<String>) -> jstring {
    let text = match value {
        Ok(text) => text,
        Err(e) => {
            log::warn!("bridge call failed: {e}");
            return std::ptr::null_mut();
        }
    };
    match env.new_string(text) {
        Ok(s) => s.into_raw(),
        Err(e) => {
            log::error!("failed to create Java string: {e}");
            std::ptr::null_mut()
        }
    }
}

fn init_logging() {
    #[cfg(target_os = "android")]
    android_logger::init_once(
        android_logger::Config::default()
            .with_max_level(log::LevelFilter::Debug)
            .with_tag("velonav"),
    );
}

/// Returns the rust-core library version.
/// Maps to: RustBridge.version() -> String
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_velonav_app_RustBridge_version(
    mut env: JNIEnv,
    _class: JClass,
) -> jstring {
    into_java(&mut env, Ok(crate::VERSION.to_string()))
}

/// Routes `log` output to logcat. Safe to call more than once.
/// Maps to: RustBridge.initLogging()
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_velonav_app_RustBridge_initLogging(
    _env: JNIEnv,
    _class: JClass,
) {
    init_logging();
}

/// Clusters a bike-parking API response.
/// Maps to: RustBridge.clusterPoints(json: String, radiusM: Double) -> String?
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_velonav_app_RustBridge_clusterPoints(
    mut env: JNIEnv,
    _class: JClass,
    json: JString,
    radius_m: jdouble,
) -> jstring {
    let result = read_string(&mut env, &json).and_then(|json| dataset::cluster_json(&json, radius_m));
    into_java(&mut env, result)
}

/// Avoidance rings for a hazard store snapshot.
/// Maps to: RustBridge.avoidanceGeometry(hazardsJson: String, radiusM: Double) -> String?
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_velonav_app_RustBridge_avoidanceGeometry(
    mut env: JNIEnv,
    _class: JClass,
    hazards_json: JString,
    radius_m: jdouble,
) -> jstring {
    let result = read_string(&mut env, &hazards_json)
        .and_then(|json| HazardModel::from_json(&json))
        .and_then(|model| {
            serde_json::to_string(&model.avoidance_geometry(radius_m))
                .map_err(|e| NavError::InvalidDataset(format!("JSON serialize error: {e}")))
        });
    into_java(&mut env, result)
}

/// Maps to: RustBridge.formatDistance(meters: Double) -> String
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_velonav_app_RustBridge_formatDistance(
    mut env: JNIEnv,
    _class: JClass,
    meters: jdouble,
) -> jstring {
    into_java(&mut env, Ok(format_distance(meters)))
}
