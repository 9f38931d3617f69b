// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// labelscan-catalog — the canonical product list and the fuzzy matcher that
// corrects recognized label text against it.

pub mod catalog;
pub mod matcher;

pub use catalog::Catalog;
pub use matcher::CatalogMatcher;
