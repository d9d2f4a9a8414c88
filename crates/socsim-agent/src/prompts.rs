//! Prompt text used by the reasoning strategies and the review workflow.

/// Few-shot exemplars shown to every reasoning strategy.
pub const EXEMPLARS: [&str; 2] = [
    "stars: 1.0\nreview: I had high hopes for the Masters Inn Fairgrounds, but my experience was a major letdown. The room was infested with roaches, and the furniture was old and falling apart. The staff was unhelpful and seemed disinterested in addressing the issues. The overall cleanliness and maintenance were poor, which made the stay very uncomfortable. Given my preference for well-maintained and clean environments, this place did not meet any of my standards. I would not recommend it to anyone, especially families or those looking for a pleasant stay.",
    "stars: 3.0\nreview: I visited Arizona Bug Doctor for pest control services, and my experience was mixed. On the positive side, the technicians were knowledgeable and thorough, which is important when dealing with pests. However, scheduling the appointment was a bit of a challenge, and the office staff could be more responsive. The limited hours of operation were also inconvenient. Overall, the service was effective, but there's room for improvement in customer service and flexibility.",
];

/// System message of the DILU strategy.
pub const DILU_SYSTEM: &str = "You are ChatGPT, a large language model trained by OpenAI. Now you act as a real human user on Yelp. You will be given a detailed description of the scenario of current frame along with your history of previous decisions.";

/// Exemplars rendered as one block, separated by blank lines.
pub fn examples_block() -> String {
    EXEMPLARS.join("\n\n")
}

/// The IO prompt, or the step-by-step prompt when `step_by_step` is set.
pub fn solve_prompt(step_by_step: bool, examples: &str, task: &str) -> String {
    let prefix = if step_by_step {
        "Solve the task step by step. "
    } else {
        ""
    };
    format!(
        "{prefix}Your instructions must follow the examples.\nHere are some examples.\n{examples}\nHere is the task:\n{task}"
    )
}

/// Step-by-step prompt with a step-back principle inserted after the
/// exemplars.
pub fn principled_solve_prompt(examples: &str, principle: &str, task: &str) -> String {
    format!(
        "Solve the task step by step. Your instructions must follow the examples.\nHere are some examples.\n{examples}\n{principle}\nHere is the task:\n{task}"
    )
}

pub fn dilu_user_prompt(examples: &str, task: &str) -> String {
    format!(
        "Above messages are some examples of how you make a step successfully in the past. Those scenarios are similar to the current scenario. You should refer to those examples to make a step for the current scenario. Your instructions must follow the examples.\nHere are two examples.\n{examples}\nHere is the task:\n{task}"
    )
}

pub fn refine_prompt(reasoning: &str) -> String {
    format!(
        "Reflect on the reasoning process and identify any potential errors or areas for improvement. Provide a revised version of the reasoning if necessary.\nHere is the original reasoning:\n{reasoning}\n"
    )
}

pub fn step_back_prompt(task: &str) -> String {
    format!("What common sense, instruction structure is involved in solving this task?\n{task}")
}

/// Ballot sent to the TOT voters. Candidates are numbered from 1.
pub fn vote_prompt(examples: &str, task: &str, candidates: &[String]) -> String {
    let mut prompt = format!(
        "Given the reasoning process for two completed tasks and one ongoing task, and several answers for the next step, decide which answer best follows the reasoning process for example command format. Output \"The best answer is {{s}}\", where s is the integer id chosen.\nHere are some examples.\n{examples}\nHere is the task:\n{task}\n\n"
    );
    for (i, candidate) in candidates.iter().enumerate() {
        prompt.push_str(&format!("Answer {}:\n{candidate}\n", i + 1));
    }
    prompt
}

/// The review-writing task handed to the reasoning strategy.
pub fn simulation_task_prompt(user: &str, business: &str, similar_review: &str) -> String {
    format!(
        "You are a real human user on Yelp, a platform for crowd-sourced business reviews. Here is your Yelp profile and review history: {user}

You need to write a review for this business: {business}

Others have reviewed this business before: {similar_review}

Please analyze the following aspects carefully:
1. Based on your user profile and review style, what rating would you give this business? Remember that many users give 5-star ratings for excellent experiences that exceed expectations, and 1-star ratings for very poor experiences that fail to meet basic standards.
2. Given the business details and your past experiences, what specific aspects would you comment on? Focus on the positive aspects that make this business stand out or negative aspects that severely impact the experience.
3. Consider how other users might engage with your review in terms of:
- Useful: How informative and helpful is your review?
- Funny: Does your review have any humorous or entertaining elements?
- Cool: Is your review particularly insightful or praiseworthy?

Requirements:
- Star rating must be one of: 1.0, 2.0, 3.0, 4.0, 5.0
- If the business meets or exceeds expectations in key areas, consider giving a 5-star rating
- If the business fails significantly in key areas, consider giving a 1-star rating
- Review text should be 2-4 sentences, focusing on your personal experience and emotional response
- Useful/funny/cool counts should be non-negative integers that reflect likely user engagement
- Maintain consistency with your historical review style and rating patterns
- Focus on specific details about the business rather than generic comments
- Be generous with ratings when businesses deliver quality service and products
- Be critical when businesses fail to meet basic standards

Format your response exactly as follows:
stars: [your rating]
review: [your review]
"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solve_prompt_variants() {
        let io = solve_prompt(false, "EX", "TASK");
        assert!(io.starts_with("Your instructions must follow the examples."));
        assert!(io.ends_with("EX\nHere is the task:\nTASK"));
        assert!(solve_prompt(true, "EX", "TASK").starts_with("Solve the task step by step. "));
    }

    #[test]
    fn principle_follows_examples() {
        let p = principled_solve_prompt("EX", "PRINCIPLE", "TASK");
        assert!(p.contains("EX\nPRINCIPLE\nHere is the task:\nTASK"));
    }

    #[test]
    fn vote_prompt_lists_candidates_from_one() {
        let p = vote_prompt("EX", "TASK", &["first".into(), "second".into()]);
        assert!(p.contains("\"The best answer is {s}\""));
        assert!(p.ends_with("Answer 1:\nfirst\nAnswer 2:\nsecond\n"));
    }

    #[test]
    fn exemplars_have_rating_format() {
        for ex in EXEMPLARS {
            assert!(ex.starts_with("stars: "));
            assert!(ex.contains("\nreview: "));
        }
        assert!(examples_block().contains("1.0") && examples_block().contains("3.0"));
    }

    #[test]
    fn task_prompt_embeds_context() {
        let p = simulation_task_prompt("USER", "BIZ", "SIMILAR");
        assert!(p.contains("review history: USER\n"));
        assert!(p.contains("this business: BIZ\n"));
        assert!(p.contains("reviewed this business before: SIMILAR\n"));
        assert!(p.ends_with("stars: [your rating]\nreview: [your review]\n"));
    }
}
