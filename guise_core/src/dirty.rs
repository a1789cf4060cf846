// Copyright 2026 the Guise Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dirty-tracking channel constants.
//!
//! Local transforms are invalidated through [`understory_dirty`]. Every
//! linked node has a dependency edge to its parent on [`LOCAL_TRANSFORM`].
//!
//! # Propagation semantics
//!
//! - Position and rotation changes are marked with the default policy: only
//!   the node itself is recomputed.
//! - Size, scale, adjust mode, reparenting, and resolution changes are marked
//!   with [`EagerPolicy`](understory_dirty::EagerPolicy), because a child's
//!   local transform reads its parent's adjust scale and size.
//!
//! # Consumption
//!
//! [`flush_local_transforms`](crate::adjust::flush_local_transforms) drains
//! the channel in parent-before-child order at the start of every render and
//! before any query that reads a transform.

use understory_dirty::Channel;

/// Local transform or adjust scale needs recomputation.
pub const LOCAL_TRANSFORM: Channel = Channel::new(0);
