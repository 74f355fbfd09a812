// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: MIT OR Apache-2.0

#[cfg(feature = "dashmap")]
pub type FastMap<K, V> = dashmap::DashMap<K, V>;
#[cfg(feature = "dashmap")]
pub type FastSet<K> = dashmap::DashSet<K>;

#[cfg(not(feature = "dashmap"))]
pub type FastMap<K, V> = std::collections::HashMap<K, V>;
#[cfg(not(feature = "dashmap"))]
pub type FastSet<K> = std::collections::HashSet<K>;
