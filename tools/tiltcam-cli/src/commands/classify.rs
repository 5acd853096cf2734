//! Classify a single sensor sample.

use tiltcam_common::config::AppConfig;
use tiltcam_orientation::{Decision, OrientationClassifier, SensorSample};

pub fn run(config: &AppConfig, alpha: f64, beta: f64, gamma: f64) -> anyhow::Result<()> {
    let classifier = OrientationClassifier::new(config.orientation.thresholds);
    let sample = SensorSample::from_angles(alpha, beta, gamma);

    println!(
        "Sample: alpha={} beta={} gamma={}",
        sample.alpha, sample.beta, sample.gamma
    );
    match classifier.classify(&sample) {
        Decision::Landscape => println!("Decision: landscape"),
        Decision::Portrait => println!("Decision: portrait"),
        Decision::NoChange => println!("Decision: no change (ambiguous tilt)"),
    }

    Ok(())
}
