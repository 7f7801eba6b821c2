// Copyright (c) 2026 supernote-server contributors
// SPDX-License-Identifier: AGPL-3.0
//! `InferenceService` implementations. The generative-model backend itself
//! is out of scope (spec §1); [`http::HttpInferenceService`] is a thin
//! reqwest client against an OpenAI-compatible chat-completions + embeddings
//! API, the shape both this project's original Gemini-backed service and
//! most self-hosted model servers (vLLM, LM Studio, Ollama's OpenAI shim)
//! expose.

pub mod http;

pub use http::HttpInferenceService;
