use anyhow::{Context, Result};

use nosh_core::models::FoodItem;
use nosh_core::openfoodfacts::{SearchResponse, product_to_food};
use nosh_core::service::FoodSearchProvider;

const SEARCH_URL: &str = "https://world.openfoodfacts.org/cgi/search.pl";

pub struct OpenFoodFactsClient {
    client: reqwest::Client,
    rt: tokio::runtime::Handle,
}

impl OpenFoodFactsClient {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(format!(
                "nosh-cli/{} (nutrition tracker)",
                env!("CARGO_PKG_VERSION")
            ))
            .timeout(std::time::Duration::from_secs(10))
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            rt: tokio::runtime::Handle::current(),
        }
    }

    pub async fn search_async(&self, query: &str) -> Result<Vec<FoodItem>> {
        let resp = self
            .client
            .get(SEARCH_URL)
            .query(&[("search_terms", query), ("json", "1"), ("page_size", "10")])
            .send()
            .await
            .context("Failed to reach OpenFoodFacts API")?;

        let data: SearchResponse = resp
            .json()
            .await
            .context("Failed to parse OpenFoodFacts search response")?;

        let foods: Vec<FoodItem> = data
            .products
            .into_iter()
            .filter_map(product_to_food)
            .collect();

        Ok(foods)
    }
}

impl FoodSearchProvider for OpenFoodFactsClient {
    fn search(&self, query: &str) -> Result<Vec<FoodItem>> {
        self.rt.block_on(self.search_async(query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- Integration tests (hit real OpenFoodFacts API) ---

    #[tokio::test]
    #[ignore = "hits OpenFoodFacts API"]
    async fn test_search_returns_results() {
        let client = OpenFoodFactsClient::new();
        let results = client.search_async("nutella").await.unwrap();
        assert!(!results.is_empty());
        // Every result should have a name and calories
        for food in &results {
            assert!(!food.name.is_empty());
            assert!(food.calories > 0.0);
        }
    }
}
