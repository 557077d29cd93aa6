//! Invariant checks over a loaded log.

use crate::validate::load::{EventRow, FrameRow};
use crate::validate::report::Finding;
use crate::validate::{EarlyEventPolicy, TIME_EPSILON};
use std::collections::HashMap;
use std::path::Path;

/// Frame ids form `1..N` and frame times never decrease.
pub fn check_frames(frames: &[FrameRow]) -> Vec<Finding> {
    if frames.is_empty() {
        return vec![Finding::error("F01", "log contains no frame rows")];
    }

    let mut findings = Vec::new();
    // `None` once the id space is exhausted; any further frame is a gap.
    let mut expected = Some(1i64);
    for frame in frames {
        if expected != Some(frame.fid) {
            let wanted = match expected {
                Some(id) => id.to_string(),
                None => "no further frame".to_string(),
            };
            findings.push(
                Finding::error(
                    "F02",
                    format!(
                        "frame id discontinuity: expected {wanted}, found {}",
                        frame.fid
                    ),
                )
                .for_frame(frame.fid),
            );
        }
        expected = frame.fid.checked_add(1);
    }

    for pair in frames.windows(2) {
        let (prev, cur) = (&pair[0], &pair[1]);
        if cur.t < prev.t - TIME_EPSILON {
            findings.push(
                Finding::error(
                    "F03",
                    format!(
                        "frame time decreases: frame {} @ {:.6} > frame {} @ {:.6}",
                        prev.fid, prev.t, cur.fid, cur.t
                    ),
                )
                .for_frame(cur.fid),
            );
        }
    }
    findings
}

/// Every event lies between its own frame and the next one.
pub fn check_events(
    frames: &[FrameRow],
    events: &[EventRow],
    early: EarlyEventPolicy,
) -> Vec<Finding> {
    if frames.is_empty() {
        if events.is_empty() {
            return Vec::new();
        }
        return vec![Finding::error("E00", "events cannot be checked without frames")];
    }

    let times: HashMap<i64, f64> = frames.iter().map(|f| (f.fid, f.t)).collect();
    let last = frames.iter().map(|f| f.fid).max().unwrap_or(0);
    let mut findings = Vec::new();

    for event in events {
        let own = match times.get(&event.fid) {
            Some(t) if event.fid >= 1 => *t,
            _ => {
                findings.push(Finding::error(
                    "E01",
                    format!(
                        "{} @ {:.6} has invalid frame_id={} (last frame {last})",
                        event.etype, event.t, event.fid
                    ),
                ));
                continue;
            }
        };

        if event.fid < last {
            if let Some(next) = times.get(&(event.fid + 1)) {
                if event.t > next + TIME_EPSILON {
                    findings.push(
                        Finding::error(
                            "E02",
                            format!(
                                "{} @ {:.6} with frame_id={} is after the next frame (t_next={next:.6})",
                                event.etype, event.t, event.fid
                            ),
                        )
                        .for_frame(event.fid),
                    );
                }
            }
        }

        if event.t < own - TIME_EPSILON {
            let finding = if event.fid > 1 {
                Finding::error(
                    "E03",
                    format!(
                        "{} @ {:.6} with frame_id={} is before its frame (t_frame={own:.6})",
                        event.etype, event.t, event.fid
                    ),
                )
            } else {
                let message = format!(
                    "{} @ {:.6} is before the first frame (t_frame1={own:.6})",
                    event.etype, event.t
                );
                match early {
                    EarlyEventPolicy::Warn => Finding::warning("W10", message),
                    EarlyEventPolicy::Error => Finding::error("E04", message),
                }
            };
            findings.push(finding.for_frame(event.fid));
        }
    }
    findings
}

/// Stored mouse deltas match the recomputed ones. Returns the number checked.
pub fn check_mouse_deltas(events: &[EventRow]) -> (Vec<Finding>, usize) {
    let mut findings = Vec::new();
    let mut checked = 0;
    let mut last: Option<(i64, i64)> = None;

    for event in events.iter().filter(|e| e.is_mouse()) {
        let (Some(x), Some(y), Some(dx), Some(dy)) = (event.x, event.y, event.dx, event.dy) else {
            continue;
        };
        let expected = match last {
            Some((px, py)) => x.checked_sub(px).zip(y.checked_sub(py)),
            None => Some((0, 0)),
        };
        if expected != Some((dx, dy)) {
            let wanted = match expected {
                Some((ex, ey)) => format!("({ex},{ey})"),
                None => "an out-of-range delta".to_string(),
            };
            findings.push(
                Finding::error(
                    "M01",
                    format!(
                        "mouse delta mismatch at t={:.6}: stored ({dx},{dy}), expected {wanted} moving {last:?} -> ({x},{y})",
                        event.t
                    ),
                )
                .for_frame(event.fid),
            );
        }
        last = Some((x, y));
        checked += 1;
    }
    (findings, checked)
}

/// Every referenced image exists; sampled images share one shape.
///
/// `sample` picks the first and last `sample` frames for the shape pass;
/// 0 skips it and a negative value checks every frame.
pub fn check_images(
    rec_dir: &Path,
    frames: &[FrameRow],
    sample: i64,
) -> (Vec<Finding>, Option<(u32, u32)>) {
    let mut findings = Vec::new();
    let mut present = vec![true; frames.len()];

    for (i, frame) in frames.iter().enumerate() {
        if frame.path.is_empty() || !rec_dir.join(&frame.path).is_file() {
            present[i] = false;
            findings.push(
                Finding::error(
                    "I01",
                    format!("frame {} image not found: {}", frame.fid, frame.path),
                )
                .for_frame(frame.fid),
            );
        }
    }

    if sample == 0 {
        return (findings, None);
    }

    let n = frames.len();
    let indices: Vec<usize> = match usize::try_from(sample) {
        Ok(k) if n > k.saturating_mul(2) => (0..k).chain(n - k..n).collect(),
        _ => (0..n).collect(),
    };

    let mut reference: Option<(u32, u32)> = None;
    for i in indices.into_iter().filter(|i| present[*i]) {
        let frame = &frames[i];
        let size = match image::image_dimensions(rec_dir.join(&frame.path)) {
            Ok(size) => size,
            Err(e) => {
                findings.push(
                    Finding::error("I02", format!("cannot read image {}: {e}", frame.path))
                        .for_frame(frame.fid),
                );
                continue;
            }
        };
        match reference {
            None => reference = Some(size),
            Some(expected) if expected != size => findings.push(
                Finding::error(
                    "I03",
                    format!(
                        "frame size differs: {} is {}x{}, expected {}x{}",
                        frame.path, size.0, size.1, expected.0, expected.1
                    ),
                )
                .for_frame(frame.fid),
            ),
            Some(_) => {}
        }
    }
    (findings, reference)
}
