// Copyright (c) 2026 supernote-server contributors
// SPDX-License-Identifier: AGPL-3.0
//! A standalone [`Renderer`] implementation that does not depend on the
//! vendor's proprietary notebook format (out of scope, spec §1). Pages are
//! delimited by a form-feed byte (`0x0C`) so integration tests and local
//! deployments can synthesize multi-page notebooks without a real decoder;
//! a file with no form-feed is treated as a single page, which is the
//! common case for anything not hand-constructed for testing.

pub mod placeholder;

pub use placeholder::PlaceholderRenderer;
