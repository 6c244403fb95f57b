// Copyright (c) 2025 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Pollution Bench Library
 * Deliberately pollutable state service for validating prototype pollution
 * detection
 *
 * @copyright 2025 Bountyy Oy
 * @license Proprietary
 */

// Key path parsing and the reserved-segment deny-list
pub mod path;

// Shared state store, template, and deep assignment
pub mod assign;
pub mod store;

// Time helper subprocess execution
pub mod helper;

// HTTP surface
pub mod server;

// Configuration and error handling
pub mod config;
pub mod errors;
