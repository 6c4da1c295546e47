//! Coin shop: consumable power-ups and permanent themes and cosmetics.

use crate::catalog::{shop_item_by_id, ItemKind, ShopItem};
use crate::document::Document;
use crate::error::{Error, Result};
use crate::profile::Inventory;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub item_id: String,
    pub kind: ItemKind,
    pub price: u64,
    pub current_coins: u64,
    /// Power-ups held after the purchase; absent for permanent items
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u64>,
}

fn owns(inventory: &Inventory, item: &ShopItem) -> bool {
    match item.kind {
        ItemKind::PowerUp => inventory.power_ups.get(item.id).is_some_and(|n| *n > 0),
        ItemKind::Theme => inventory.themes.contains(item.id),
        ItemKind::Cosmetic => inventory.cosmetics.contains(item.id),
    }
}

impl Document {
    /// Buy a shop item with coins. Permanent items can be bought once.
    pub fn buy_item(&mut self, id: &str, item_id: &str) -> Result<Purchase> {
        let profile = self.profile_mut(id)?;
        let item = shop_item_by_id(item_id).ok_or_else(|| Error::UnknownItem(item_id.to_string()))?;

        if item.kind != ItemKind::PowerUp && owns(&profile.inventory, item) {
            return Err(Error::AlreadyOwned(item.id.to_string()));
        }
        if profile.current_coins < item.price {
            return Err(Error::InsufficientCoins {
                needed: item.price,
                available: profile.current_coins,
            });
        }
        profile.current_coins -= item.price;

        let inventory = &mut profile.inventory;
        let quantity = match item.kind {
            ItemKind::PowerUp => {
                let count = inventory.power_ups.entry(item.id.to_string()).or_default();
                *count = count.saturating_add(1);
                Some(*count)
            }
            ItemKind::Theme => {
                inventory.themes.insert(item.id.to_string());
                None
            }
            ItemKind::Cosmetic => {
                inventory.cosmetics.insert(item.id.to_string());
                None
            }
        };

        Ok(Purchase {
            item_id: item.id.to_string(),
            kind: item.kind,
            price: item.price,
            current_coins: profile.current_coins,
            quantity,
        })
    }

    /// Consume one power-up; returns how many are left.
    pub fn use_power_up(&mut self, id: &str, item_id: &str) -> Result<u64> {
        let profile = self.profile_mut(id)?;
        match shop_item_by_id(item_id) {
            Some(item) if item.kind == ItemKind::PowerUp => {}
            _ => return Err(Error::UnknownItem(item_id.to_string())),
        }

        match profile.inventory.power_ups.get_mut(item_id) {
            Some(count) if *count > 0 => {
                *count -= 1;
                Ok(*count)
            }
            _ => Err(Error::InsufficientPowerUps(item_id.to_string())),
        }
    }

    pub fn has_item(&self, id: &str, item_id: &str) -> Result<bool> {
        let profile = self.profile(id)?;
        let item = shop_item_by_id(item_id).ok_or_else(|| Error::UnknownItem(item_id.to_string()))?;
        Ok(owns(&profile.inventory, item))
    }
}
