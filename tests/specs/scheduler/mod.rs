// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

mod concurrency;
mod dev_prod;
mod independent;
mod locks;
mod persistence;
