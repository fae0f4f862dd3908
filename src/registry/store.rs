//! Client registry implementation
//!
//! Clients are keyed by their handle key, addressed by poll token and kept
//! in attach order for iteration. Every insert and removal bumps a cookie;
//! code that walks the clients across several lock sections compares the
//! cookie and restarts the walk when it changed in between.

use std::collections::HashMap;

use mio::Token;

use super::entry::Client;
use crate::transport::HandleKey;

/// Set of attached clients
pub struct ClientRegistry<H> {
    clients: HashMap<Token, Client<H>>,
    by_key: HashMap<HandleKey, Token>,
    order: Vec<Token>,
    cookie: u64,
}

impl<H> ClientRegistry<H> {
    pub fn new() -> Self {
        Self {
            clients: HashMap::new(),
            by_key: HashMap::new(),
            order: Vec::new(),
            cookie: 0,
        }
    }

    /// Insert a client; gives it back if its key is already present
    pub fn insert(&mut self, client: Client<H>) -> Result<(), Client<H>> {
        if self.by_key.contains_key(&client.key) {
            return Err(client);
        }
        self.by_key.insert(client.key, client.token);
        self.order.push(client.token);
        self.clients.insert(client.token, client);
        self.cookie += 1;
        Ok(())
    }

    /// Remove a client by token
    pub fn remove(&mut self, token: Token) -> Option<Client<H>> {
        let client = self.clients.remove(&token)?;
        self.by_key.remove(&client.key);
        self.order.retain(|t| *t != token);
        self.cookie += 1;
        Some(client)
    }

    pub fn get(&self, token: Token) -> Option<&Client<H>> {
        self.clients.get(&token)
    }

    pub fn get_mut(&mut self, token: Token) -> Option<&mut Client<H>> {
        self.clients.get_mut(&token)
    }

    /// Token of the client attached with `key`
    pub fn token_of(&self, key: HandleKey) -> Option<Token> {
        self.by_key.get(&key).copied()
    }

    pub fn contains_key(&self, key: HandleKey) -> bool {
        self.by_key.contains_key(&key)
    }

    /// Token at `index` in attach order
    pub fn token_at(&self, index: usize) -> Option<Token> {
        self.order.get(index).copied()
    }

    /// Tokens in attach order
    pub fn tokens(&self) -> Vec<Token> {
        self.order.clone()
    }

    /// Clients in attach order (tokens are allocated monotonically)
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Client<H>> + '_ {
        let mut entries: Vec<&mut Client<H>> = self.clients.values_mut().collect();
        entries.sort_by_key(|c| c.token.0);
        entries.into_iter()
    }

    /// Change counter, bumped on every insert and removal
    pub fn cookie(&self) -> u64 {
        self.cookie
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl<H> Default for ClientRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}
