// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Layout assembler: typed layout elements in reading order.
//
// Regions without a box are dropped silently, the rest are stably sorted by
// the model's position, labels are mapped onto the fixed element-type table,
// and each region is built into a canonical element. A region with malformed
// geometry is skipped and logged; it never fails the document.

use seitenwerk_core::types::{DetectedElement, ElementType, LayoutElement};
use tracing::{debug, warn};

use crate::element::{self, RegionOutcome, SkipReason};
use crate::geometry;
use crate::toolkit::{PredictionBatch, RegionPrediction};

/// A region the assembler left out.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRegion {
    /// Index of the region in detection order.
    pub index: usize,
    pub reason: SkipReason,
}

/// Assembled layout of one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutAssembly {
    /// Typed regions, in reading order.
    pub layout_elements: Vec<LayoutElement>,
    /// The same regions as plain elements, same order.
    pub reading_order: Vec<DetectedElement>,
    /// Regions that were present but could not be built.
    pub skipped: Vec<SkippedRegion>,
}

impl LayoutAssembly {
    /// Split into `(layout_elements, reading_order)`.
    pub fn into_parts(self) -> (Vec<LayoutElement>, Vec<DetectedElement>) {
        (self.layout_elements, self.reading_order)
    }
}

/// Assemble a layout-detection batch.
pub fn assemble(batch: &PredictionBatch) -> LayoutAssembly {
    assemble_regions(batch.regions())
}

/// Assemble layout regions reported in detection order.
pub fn assemble_regions(regions: &[Box<dyn RegionPrediction>]) -> LayoutAssembly {
    let mut ordered: Vec<(usize, i32, &dyn RegionPrediction)> = regions
        .iter()
        .enumerate()
        .filter_map(|(index, region)| {
            let has_box = region.bbox().is_some_and(|bbox| geometry::box_present(&bbox));
            if !has_box {
                debug!(index, "Layout region has no box; dropping");
                return None;
            }
            let position = element::coerce_reading_order(region.position().as_ref());
            Some((index, position, region.as_ref()))
        })
        .collect();

    // Stable: equal positions keep detection order.
    ordered.sort_by_key(|(_, position, _)| *position);

    let mut assembly = LayoutAssembly {
        layout_elements: Vec::with_capacity(ordered.len()),
        reading_order: Vec::with_capacity(ordered.len()),
        skipped: Vec::new(),
    };

    for (index, _, region) in ordered {
        match element::build_region(region) {
            RegionOutcome::Built(element) => {
                let element_type = ElementType::from_label(region.label());
                assembly.reading_order.push(element.clone());
                assembly.layout_elements.push(LayoutElement {
                    element_type,
                    element,
                });
            }
            RegionOutcome::Skipped(reason) => {
                warn!(
                    index,
                    label = region.label().unwrap_or("<none>"),
                    %reason,
                    "Skipping invalid layout region"
                );
                assembly.skipped.push(SkippedRegion { index, reason });
            }
        }
    }

    debug!(
        elements = assembly.layout_elements.len(),
        skipped = assembly.skipped.len(),
        "Layout assembled"
    );
    assembly
}
