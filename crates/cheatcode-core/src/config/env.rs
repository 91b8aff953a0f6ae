use super::Config;

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("CHEATCODE_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("CHEATCODE_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("CHEATCODE_LLM_EMBEDDING_MODEL") {
            self.llm.embedding_model = v;
        }
        if let Ok(v) = std::env::var("CHEATCODE_INDEX_CHUNK_SIZE") {
            if let Ok(size) = v.parse::<usize>() {
                self.index.chunk_size = size;
            } else {
                tracing::warn!("ignoring invalid CHEATCODE_INDEX_CHUNK_SIZE value: {v}");
            }
        }
        if let Ok(v) = std::env::var("CHEATCODE_RETRIEVAL_K") {
            if let Ok(k) = v.parse::<usize>() {
                self.retrieval.k = k;
            } else {
                tracing::warn!("ignoring invalid CHEATCODE_RETRIEVAL_K value: {v}");
            }
        }
        if let Ok(v) = std::env::var("CHEATCODE_RETRIEVAL_FETCH_K") {
            if let Ok(fetch_k) = v.parse::<usize>() {
                self.retrieval.fetch_k = fetch_k;
            } else {
                tracing::warn!("ignoring invalid CHEATCODE_RETRIEVAL_FETCH_K value: {v}");
            }
        }
        if let Ok(v) = std::env::var("CHEATCODE_RETRIEVAL_DIVERSIFY") {
            if let Ok(diversify) = v.parse::<bool>() {
                self.retrieval.diversify = diversify;
            } else {
                tracing::warn!("ignoring invalid CHEATCODE_RETRIEVAL_DIVERSIFY value: {v}");
            }
        }
        if let Ok(v) = std::env::var("CHEATCODE_CHAT_MAX_CONTEXT_TOKENS") {
            if let Ok(tokens) = v.parse::<usize>() {
                self.chat.max_context_tokens = tokens;
            } else {
                tracing::warn!("ignoring invalid CHEATCODE_CHAT_MAX_CONTEXT_TOKENS value: {v}");
            }
        }
        if let Ok(v) = std::env::var("CHEATCODE_GATEWAY_BIND") {
            self.gateway.bind = v;
        }
        if let Ok(v) = std::env::var("CHEATCODE_GATEWAY_PORT") {
            if let Ok(port) = v.parse::<u16>() {
                self.gateway.port = port;
            } else {
                tracing::warn!("ignoring invalid CHEATCODE_GATEWAY_PORT value: {v}");
            }
        }
    }
}
