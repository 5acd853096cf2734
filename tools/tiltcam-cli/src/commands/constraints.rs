//! Print the camera request for an orientation.

use tiltcam_capture_engine::CaptureConstraints;
use tiltcam_common::posture::Orientation;

pub fn run(orientation: Orientation) -> anyhow::Result<()> {
    let constraints = CaptureConstraints::for_orientation(orientation);
    println!("{}", serde_json::to_string_pretty(&constraints)?);
    Ok(())
}
