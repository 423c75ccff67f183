use ndarray::{ArrayView3, Axis};

use super::model::{ChannelId, PlaneMap};
use crate::error::{PoldivError, Result};

// ---------------------------------------------------------------------------
// Plane layouts
// ---------------------------------------------------------------------------

/// Plane index of each channel and mask, in [`ChannelId::ALL`] order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneLayout {
    pub channels: [usize; 7],
    pub masks: [usize; 7],
}

/// 7- and 9-channel exports (2018 and later acquisitions).
pub const LAYOUT_7_9: PlaneLayout = PlaneLayout {
    channels: [0, 1, 2, 3, 4, 5, 6],
    masks: [7, 8, 9, 10, 11, 12, 13],
};

/// 12-channel exports: channel 9 sits at plane 8, masks start at plane 12.
pub const LAYOUT_12: PlaneLayout = PlaneLayout {
    channels: [0, 1, 2, 3, 4, 5, 8],
    masks: [12, 13, 14, 15, 16, 17, 20],
};

/// Layout for an image holding `channel_count` channel/mask pairs.
pub fn layout_for(channel_count: usize) -> Option<&'static PlaneLayout> {
    match channel_count {
        7 | 9 => Some(&LAYOUT_7_9),
        12 => Some(&LAYOUT_12),
        _ => None,
    }
}

impl PlaneLayout {
    /// Highest plane index the layout reads.
    pub fn max_plane(&self) -> usize {
        self.channels
            .iter()
            .chain(self.masks.iter())
            .copied()
            .max()
            .unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Demultiplexing
// ---------------------------------------------------------------------------

/// Split a `(height, width, planes)` sample into channel and mask maps.
///
/// `channel_count` is the number of channel/mask pairs in the export
/// (`planes / 2`); it selects the layout. Planes are copied out unchanged.
pub fn demux(
    filename: &str,
    image: ArrayView3<'_, u16>,
    channel_count: usize,
) -> Result<(PlaneMap, PlaneMap)> {
    let layout = layout_for(channel_count).ok_or_else(|| PoldivError::UnrecognizedLayout {
        filename: filename.to_string(),
        channels: channel_count.to_string(),
    })?;

    let planes = image.len_of(Axis(2));
    let max_plane = layout.max_plane();
    if max_plane >= planes {
        return Err(PoldivError::PlaneOutOfRange {
            filename: filename.to_string(),
            index: max_plane,
            planes,
        });
    }

    let pick = |indices: &[usize; 7]| -> PlaneMap {
        ChannelId::ALL
            .iter()
            .zip(indices)
            .map(|(id, &idx)| (*id, image.index_axis(Axis(2), idx).to_owned()))
            .collect()
    };

    Ok((pick(&layout.channels), pick(&layout.masks)))
}
