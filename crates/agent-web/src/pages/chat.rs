//! Chat Page

use leptos::prelude::*;
use uuid::Uuid;

use crate::api::{self, RunAgentInput};
use crate::components::{MessageBubble, ProverbsCard};
use crate::dispatch::{PendingResolution, frontend_declarations, resolve_pending};
use crate::state::{ClientLocalState, Transcript};
use crate::theme::container_style;

/// Signals one conversation runs against
#[derive(Clone, Copy)]
struct ChatContext {
    transcript: RwSignal<Transcript>,
    local: RwSignal<ClientLocalState>,
    thread_id: StoredValue<String>,
}

impl ChatContext {
    fn request(self) -> RunAgentInput {
        self.transcript.with_untracked(|t| RunAgentInput {
            thread_id: self.thread_id.get_value(),
            run_id: Uuid::new_v4().to_string(),
            messages: t.input_messages(),
            tools: frontend_declarations(),
            state: t.outgoing_state(),
        })
    }

    /// Answer automatic frontend calls; true when a follow-up run should start
    fn answer_pending(self) -> bool {
        let pending = self.transcript.with_untracked(|t| t.pending.clone());
        let mut answered = false;
        let mut waiting = false;

        for id in pending {
            let Some(call) = self.transcript.with_untracked(|t| t.call(&id).cloned()) else {
                continue;
            };
            let mut local = self.local.get_untracked();
            match resolve_pending(&call, &mut local) {
                PendingResolution::Answer(content) => {
                    self.local.set(local);
                    self.transcript
                        .update(|t| t.push_tool_result(Uuid::new_v4().to_string(), &id, content));
                    answered = true;
                }
                PendingResolution::AwaitUser => waiting = true,
            }
        }

        answered && !waiting
    }

    /// Run until the agent finishes or waits on the user
    async fn drive(self) {
        loop {
            let request = self.request();
            self.transcript.update(|t| t.running = true);

            let transcript = self.transcript;
            if let Err(error) = api::run_agent(&request, |event| transcript.update(|t| t.apply(event))).await {
                transcript.update(|t| {
                    t.running = false;
                    t.error = Some(error);
                });
                return;
            }

            if !self.answer_pending() {
                return;
            }
        }
    }
}

#[component]
pub fn ChatPage() -> impl IntoView {
    let ctx = ChatContext {
        transcript: RwSignal::new(Transcript::new()),
        local: RwSignal::new(ClientLocalState::default()),
        thread_id: StoredValue::new(Uuid::new_v4().to_string()),
    };
    let transcript = ctx.transcript;
    let local = ctx.local;
    let (input, set_input) = signal(String::new());

    let send = move || {
        let text = input.get_untracked();
        if text.trim().is_empty() || transcript.with_untracked(|t| t.running) {
            return;
        }

        transcript.update(|t| {
            t.cancel_pending();
            t.push_user(Uuid::new_v4().to_string(), text);
        });
        set_input.set(String::new());
        leptos::task::spawn_local(ctx.drive());
    };

    let on_respond = Callback::new(move |(tool_call_id, answer): (String, String)| {
        transcript.update(|t| t.push_tool_result(Uuid::new_v4().to_string(), &tool_call_id, answer));
        if transcript.with_untracked(|t| t.pending.is_empty()) {
            leptos::task::spawn_local(ctx.drive());
        }
    });

    let on_remove = Callback::new(move |index: usize| transcript.update(|t| t.remove_proverb(index)));

    let running = move || transcript.with(|t| t.running);

    view! {
        <div class="chat-container" style=move || local.with(container_style)>
            <div class="chat-panel">
                <header class="chat-header">
                    <h1>"Assistant"</h1>
                </header>

                {move || {
                    let theme_color = local.with(|l| l.theme_color.clone());
                    transcript.with(|t| view! {
                        <ProverbsCard
                            proverbs=t.state.proverbs.clone()
                            theme_color=theme_color
                            on_remove=on_remove
                        />
                    })
                }}

                <div class="messages">
                    <div class="message message-assistant">
                        <p class="content">"👋 Hi, there! You're chatting with an agent."</p>
                    </div>
                    {move || {
                        let theme_color = local.with(|l| l.theme_color.clone());
                        transcript.with(|t| {
                            t.messages
                                .iter()
                                .filter(|m| m.is_visible())
                                .cloned()
                                .map(|message| view! {
                                    <MessageBubble
                                        message=message
                                        theme_color=theme_color.clone()
                                        pending=t.pending.clone()
                                        on_respond=on_respond
                                    />
                                })
                                .collect_view()
                        })
                    }}
                    <Show when=running>
                        <div class="message loading">"..."</div>
                    </Show>
                    {move || transcript.with(|t| t.error.clone()).map(|error| view! {
                        <div class="message message-error">{error}</div>
                    })}
                </div>

                <div class="input-area">
                    <textarea
                        placeholder="Ask anything..."
                        prop:value=move || input.get()
                        on:input=move |ev| set_input.set(event_target_value(&ev))
                        on:keydown=move |ev| {
                            if ev.key() == "Enter" && !ev.shift_key() {
                                ev.prevent_default();
                                send();
                            }
                        }
                    />
                    <button on:click=move |_| send() disabled=running>
                        {move || if running() { "..." } else { "Send" }}
                    </button>
                </div>
            </div>
        </div>
    }
}
