// ABOUTME: Core types and constants for the Pierre plan-generation subsystem
// ABOUTME: Foundation crate with error handling, task model, plan schema, and provider configs
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # Pierre Plan Core
//!
//! Foundation crate shared by the AI provider clients and the generation
//! pipeline. It changes infrequently so the heavier crates above it compile
//! incrementally.
//!
//! ## Modules
//!
//! - **errors**: Unified error handling with `AppError` and `ErrorCode`
//! - **models**: Generation tasks, plan documents, and AI provider configuration
//! - **constants**: Defaults and limits for generation, tasks, and plan validation

/// Unified error handling system with standard error codes
pub mod errors;

/// Task, plan, and provider configuration models
pub mod models;

/// Defaults and validation limits organized by domain
pub mod constants;
